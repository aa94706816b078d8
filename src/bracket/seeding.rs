//! Seed placement for elimination brackets.

/// Bracket size for a field: the next power of two, minimum 2.
#[must_use]
pub fn bracket_size(field: usize) -> usize {
    field.next_power_of_two().max(2)
}

/// Seed numbers (1-indexed) in first-round slot order for a bracket of
/// `size` (a power of two).
///
/// Consecutive pairs form the first-round matches: seed 1 meets the
/// lowest seed, seed 2 the second-lowest, and so on, so top seeds meet as
/// late as possible. For size 8: `[1, 8, 4, 5, 2, 7, 3, 6]`.
#[must_use]
pub fn seeding_order(size: usize) -> Vec<usize> {
    debug_assert!(size.is_power_of_two());
    let mut order = vec![1];
    while order.len() < size {
        let doubled = order.len() * 2;
        let mut next = Vec::with_capacity(doubled);
        for &seed in &order {
            next.push(seed);
            next.push(doubled + 1 - seed);
        }
        order = next;
    }
    order
}
