use tagalloc::{AllocatorConfig, Arena, ExplicitAllocator, GrowthPolicy};
use tracing_subscriber::EnvFilter;

/// Prints the arena bounds and every block, the way `print_heap` in a
/// malloc lab would.
fn print_heap(
  label: &str,
  allocator: &ExplicitAllocator,
) {
  let stats = allocator.stats();
  println!(
    "\n[{}] heap = {} bytes, {} allocated / {} free blocks, utilization {:.1}%",
    label,
    stats.heap_size,
    stats.allocated_blocks,
    stats.free_blocks,
    stats.utilization() * 100.0,
  );
  print!("{}", allocator.dump());

  if let Err(violation) = allocator.check_heap() {
    println!("[{}] heap check failed: {}", label, violation);
  }
}

fn main() {
  // RUST_LOG=tagalloc=trace shows every allocate / release / split
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let config = AllocatorConfig::new()
    .with_max_heap(1 << 20)
    .with_growth(GrowthPolicy::Exact);

  let mut allocator = match ExplicitAllocator::with_config(config) {
    Ok(allocator) => allocator,
    Err(err) => {
      eprintln!("failed to set up the allocator: {err}");
      std::process::exit(1);
    }
  };

  println!(
    "arena low = {:?}, high = {:?}",
    allocator.arena().low(),
    allocator.arena().high(),
  );

  // --------------------------------------------------------------------
  // 1) Two allocations grow the arena.
  // --------------------------------------------------------------------
  let Some(a) = allocator.allocate(100) else {
    return;
  };
  let Some(b) = allocator.allocate(200) else {
    return;
  };
  allocator.payload_mut(b)[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  print_heap("1: a = allocate(100), b = allocate(200)", &allocator);

  // --------------------------------------------------------------------
  // 2) Freeing `a` puts its block on the free list.
  // --------------------------------------------------------------------
  allocator.release(a);
  print_heap("2: release(a)", &allocator);

  // --------------------------------------------------------------------
  // 3) A smaller request reuses a's block and splits off the tail.
  // --------------------------------------------------------------------
  let heap_before = allocator.heap_size();
  let Some(c) = allocator.allocate(50) else {
    return;
  };
  print_heap("3: c = allocate(50)", &allocator);
  println!(
    "[3] c reused a's block? {}, arena grew? {}",
    c == a,
    allocator.heap_size() != heap_before,
  );

  // --------------------------------------------------------------------
  // 4) Reallocation moves b and keeps its contents.
  // --------------------------------------------------------------------
  let Some(b) = allocator.reallocate(Some(b), 400) else {
    return;
  };
  let mut word = [0u8; 4];
  word.copy_from_slice(&allocator.payload(b)[..4]);
  print_heap("4: b = reallocate(b, 400)", &allocator);
  println!("[4] first word of b = 0x{:X}", u32::from_ne_bytes(word));

  // --------------------------------------------------------------------
  // 5) Freeing everything coalesces back into one block.
  // --------------------------------------------------------------------
  allocator.release(c);
  allocator.release(b);
  print_heap("5: release(c), release(b)", &allocator);

  // --------------------------------------------------------------------
  // 6) Zero-sized requests never allocate.
  // --------------------------------------------------------------------
  println!("\n[6] allocate(0) = {:?}", allocator.allocate(0));
}
