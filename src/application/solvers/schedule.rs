//! Schedule representation
//!
//! The shared solver representation: a dense `(machine, day, shift)` slot
//! table holding an optional block index. Scans are linear passes and a
//! clone is one buffer copy, which matters for the batched neighbourhood
//! evaluation.

/// Dense schedule: at most one block per (machine, day, shift) slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    machines: usize,
    days: usize,
    shifts: usize,
    slots: Vec<Option<u32>>,
}

impl Schedule {
    /// Creates an empty (all-idle) schedule with the given dimensions
    pub fn empty(machines: usize, days: usize, shifts: usize) -> Self {
        Self {
            machines,
            days,
            shifts,
            slots: vec![None; machines * days * shifts],
        }
    }

    pub fn num_machines(&self) -> usize {
        self.machines
    }

    pub fn num_days(&self) -> usize {
        self.days
    }

    pub fn shifts_per_day(&self) -> usize {
        self.shifts
    }

    #[inline]
    fn index(&self, m: usize, d: usize, s: usize) -> usize {
        (m * self.days + d) * self.shifts + s
    }

    /// Block assigned at a slot, if any
    #[inline]
    pub fn get(&self, m: usize, d: usize, s: usize) -> Option<usize> {
        self.slots[self.index(m, d, s)].map(|b| b as usize)
    }

    /// Assigns (or clears, with `None`) a slot
    #[inline]
    pub fn set(&mut self, m: usize, d: usize, s: usize, block: Option<usize>) {
        let idx = self.index(m, d, s);
        self.slots[idx] = block.map(|b| b as u32);
    }

    /// Iterates assigned slots in stable (machine, day, shift) order
    pub fn assignments(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        let shifts = self.shifts;
        let days = self.days;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(idx, slot)| {
                slot.map(|b| {
                    let s = idx % shifts;
                    let d = (idx / shifts) % days;
                    let m = idx / (shifts * days);
                    (m, d, s, b as usize)
                })
            })
    }

    /// Count of assigned slots
    pub fn assigned_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Total production under the view's rates, uncapped
    pub fn raw_production(&self, view: &crate::application::services::ProblemView) -> f64 {
        self.assignments()
            .map(|(m, _, _, b)| view.rate(m, b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let mut schedule = Schedule::empty(2, 3, 2);
        assert_eq!(schedule.get(1, 2, 1), None);
        schedule.set(1, 2, 1, Some(4));
        assert_eq!(schedule.get(1, 2, 1), Some(4));
        schedule.set(1, 2, 1, None);
        assert_eq!(schedule.get(1, 2, 1), None);
    }

    #[test]
    fn test_assignments_stable_order() {
        let mut schedule = Schedule::empty(2, 2, 2);
        schedule.set(1, 0, 1, Some(0));
        schedule.set(0, 1, 0, Some(2));
        schedule.set(0, 0, 0, Some(1));

        let order: Vec<_> = schedule.assignments().collect();
        assert_eq!(
            order,
            vec![(0, 0, 0, 1), (0, 1, 0, 2), (1, 0, 1, 0)]
        );
    }
}
