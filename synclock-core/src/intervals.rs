//! Slot durations for one output cycle.
//!
//! A cycle of `period * divisor` ticks is cut into `multiplier` slots using
//! 4-bit fixed-point accumulation so rounding error never builds up across
//! slots. The last slot absorbs whatever is left so the slots always sum to
//! the cycle length exactly.

use synclock_types::{clamp_divisor, clamp_multiplier, clamp_period, MAX_MULT};

const FRACTION_BITS: u32 = 4;
const FRACTION_MASK: u64 = (1 << FRACTION_BITS) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable {
    slots: [u32; MAX_MULT as usize],
    multiplier: u8,
    total: u32,
    quarter: u32,
}

impl IntervalTable {
    pub fn new(period: u32, divisor: u8, multiplier: u8) -> Self {
        let mut table = Self {
            slots: [0; MAX_MULT as usize],
            multiplier: 1,
            total: 0,
            quarter: 1,
        };
        table.recompute(period, divisor, multiplier);
        table
    }

    /// Rebuild every slot from scratch.
    pub fn recompute(&mut self, period: u32, divisor: u8, multiplier: u8) {
        let divisor = clamp_divisor(divisor);
        let multiplier = clamp_multiplier(multiplier);
        let total = clamp_period(period, divisor) * divisor as u32;
        let count = multiplier as usize;

        let share = ((total as u64) << FRACTION_BITS) / multiplier as u64;
        let mut carry = 0u64;
        let mut acc = 0u32;
        for slot in &mut self.slots[..count] {
            let scaled = share + carry;
            *slot = (scaled >> FRACTION_BITS) as u32;
            carry = scaled & FRACTION_MASK;
            acc += *slot;
        }
        self.slots[count - 1] += total - acc;

        let first = self.slots[0];
        for slot in &mut self.slots[count..] {
            *slot = first;
        }

        self.multiplier = multiplier;
        self.total = total;
        self.quarter = (first >> 2).max(1);
    }

    /// Duration of slot `index`. Out-of-range reads return slot 0.
    pub fn slot(&self, index: u8) -> u32 {
        self.slots
            .get(index as usize)
            .copied()
            .unwrap_or(self.slots[0])
    }

    /// The live slots, `multiplier` entries.
    pub fn slots(&self) -> &[u32] {
        &self.slots[..self.multiplier as usize]
    }

    /// Sum of slots before `index`.
    pub fn offset_of(&self, index: u8) -> u32 {
        let end = (index as usize).min(self.multiplier as usize);
        self.slots[..end].iter().sum()
    }

    pub fn multiplier(&self) -> u8 {
        self.multiplier
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Debounce window used for near-boundary decisions.
    pub fn quarter(&self) -> u32 {
        self.quarter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let t = IntervalTable::new(100, 1, 4);
        assert_eq!(t.slots(), &[25, 25, 25, 25]);
        assert_eq!(t.quarter(), 6);
    }

    #[test]
    fn test_fractional_carry_alternates() {
        let t = IntervalTable::new(100, 1, 8);
        assert_eq!(t.slots(), &[12, 13, 12, 13, 12, 13, 12, 13]);
        assert_eq!(t.slots().iter().sum::<u32>(), 100);
    }

    #[test]
    fn test_last_slot_absorbs_residual() {
        // 100 / 3 = 33.333; fixed point gives 33, 33, 33 and the last takes the extra tick
        let t = IntervalTable::new(100, 1, 3);
        assert_eq!(t.slots(), &[33, 33, 34]);
    }

    #[test]
    fn test_sum_invariant_exhaustive_small() {
        for period in [1u32, 2, 3, 7, 15, 16, 17, 99, 100, 101, 499, 500, 12_345, 59_999] {
            for divisor in 1u8..=8 {
                for multiplier in 1u8..=MAX_MULT {
                    let t = IntervalTable::new(period, divisor, multiplier);
                    let sum: u64 = t.slots().iter().map(|&s| s as u64).sum();
                    assert_eq!(
                        sum,
                        period as u64 * divisor as u64,
                        "period={period} div={divisor} mult={multiplier}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_sum_invariant_near_u32_limit() {
        let period = u32::MAX / 7;
        let t = IntervalTable::new(period, 7, 13);
        let sum: u64 = t.slots().iter().map(|&s| s as u64).sum();
        assert_eq!(sum, period as u64 * 7);
    }

    #[test]
    fn test_recompute_is_stable() {
        let mut t = IntervalTable::new(333, 3, 7);
        let first = t.clone();
        for _ in 0..100 {
            t.recompute(333, 3, 7);
        }
        assert_eq!(t, first);
    }

    #[test]
    fn test_padding_mirrors_slot_zero() {
        let t = IntervalTable::new(90, 1, 3);
        for i in 3..MAX_MULT {
            assert_eq!(t.slot(i), t.slot(0));
        }
        assert_eq!(t.slot(200), t.slot(0));
    }

    #[test]
    fn test_clamps_inputs() {
        let t = IntervalTable::new(0, 0, 0);
        assert_eq!(t.multiplier(), 1);
        assert_eq!(t.slots(), &[1]);
        assert_eq!(t.quarter(), 1);

        let t = IntervalTable::new(100, 1, 255);
        assert_eq!(t.multiplier(), MAX_MULT);
    }

    #[test]
    fn test_tiny_period_many_slots() {
        // fewer ticks than slots: early slots are zero-length, the sum still holds
        let t = IntervalTable::new(3, 1, 8);
        assert_eq!(t.slots().iter().sum::<u32>(), 3);
        assert_eq!(t.quarter(), 1);
    }

    #[test]
    fn test_offset_of() {
        let t = IntervalTable::new(100, 1, 4);
        assert_eq!(t.offset_of(0), 0);
        assert_eq!(t.offset_of(2), 50);
        assert_eq!(t.offset_of(4), 100);
        assert_eq!(t.offset_of(9), 100);
    }
}
