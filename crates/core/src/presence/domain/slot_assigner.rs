//! Left-to-right binding of per-frame subjects to player slots.
//!
//! Binding is positional only. Two players who cross in front of the camera
//! swap slots.

use crate::gesture::domain::segmenter::GestureReading;
use crate::presence::domain::slot_state::SlotState;

/// Orders `items` by `center_x` ascending and returns one entry per slot.
///
/// Slot `i` holds the item with the `i`-th smallest centre; slots beyond the
/// number of items are `None`, and items beyond `max_slots` are dropped.
/// Equal centres keep their input order.
pub fn assign_slots<T>(
    mut items: Vec<T>,
    center_x: impl Fn(&T) -> i32,
    max_slots: usize,
) -> Vec<Option<T>> {
    items.sort_by_key(|item| center_x(item));
    let mut slots: Vec<Option<T>> = items.into_iter().take(max_slots).map(Some).collect();
    slots.resize_with(max_slots, || None);
    slots
}

/// Applies one frame's assignment. Unbound slots are cleared, never left at
/// their last known value.
pub fn update_slots(states: &mut [SlotState], assigned: &[Option<GestureReading>]) {
    for (i, state) in states.iter_mut().enumerate() {
        match assigned.get(i).copied().flatten() {
            Some(reading) => state.observe(&reading),
            None => state.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::domain::direction::Direction;
    use rstest::rstest;

    fn present(direction: Direction) -> GestureReading {
        GestureReading {
            present: true,
            direction: Some(direction),
            openness: 20,
            fraction: 0.3,
        }
    }

    #[rstest]
    #[case::unordered(vec![400, 100, 250], 3, vec![Some(100), Some(250), Some(400)])]
    #[case::extra_dropped(vec![300, 50, 200], 2, vec![Some(50), Some(200)])]
    #[case::fewer_than_slots(vec![120], 2, vec![Some(120), None])]
    #[case::empty(vec![], 2, vec![None, None])]
    fn test_assign_slots(#[case] xs: Vec<i32>, #[case] max: usize, #[case] expected: Vec<Option<i32>>) {
        assert_eq!(assign_slots(xs, |&x| x, max), expected);
    }

    #[test]
    fn test_assign_slots_ties_keep_input_order() {
        let items = vec![(200, "a"), (100, "b"), (200, "c")];
        let slots = assign_slots(items, |item| item.0, 3);
        assert_eq!(slots, vec![Some((100, "b")), Some((200, "a")), Some((200, "c"))]);
    }

    #[test]
    fn test_crossing_subjects_swap_slots() {
        // Frame 1: "alice" left at 100, "bob" right at 400.
        let frame1 = assign_slots(vec![("alice", 100), ("bob", 400)], |s| s.1, 2);
        // Frame 2: they have crossed.
        let frame2 = assign_slots(vec![("alice", 400), ("bob", 100)], |s| s.1, 2);

        assert_eq!(frame1[0], Some(("alice", 100)));
        assert_eq!(frame2[0], Some(("bob", 100)));
        assert_eq!(frame2[1], Some(("alice", 400)));
    }

    #[test]
    fn test_update_slots_clears_missing_subjects() {
        let mut states = vec![SlotState::default(); 2];
        update_slots(&mut states, &[Some(present(Direction::Left)), Some(present(Direction::Up))]);
        assert!(states[1].current());

        update_slots(&mut states, &[Some(present(Direction::Right)), None]);

        assert!(states[0].current());
        assert_eq!(states[0].direction(), Some(Direction::Right));
        assert!(!states[1].current());
        assert_eq!(states[1].direction(), None);
    }

    #[test]
    fn test_update_slots_short_assignment_clears_rest() {
        let mut states = vec![SlotState::default(); 3];
        update_slots(&mut states, &[Some(present(Direction::Down)); 3]);

        update_slots(&mut states, &[]);

        assert!(states.iter().all(|s| !s.current() && s.direction().is_none()));
    }
}
