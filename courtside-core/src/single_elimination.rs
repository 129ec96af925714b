//! Single elimination progression rules.
//!
//! Matches are addressed by `(round, position)` where both are 1-based and
//! `position` is the slot index of the match within its round. The winner of
//! the match at position `p` feeds the match at position `ceil(p / 2)` in the
//! following round, filling the first team slot if `p` is odd and the second
//! if `p` is even.

use crate::Slot;

/// The slot of a next-round match that receives the winner of a completed
/// match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub round: u32,
    pub position: u32,
    pub slot: Slot,
}

/// How a winner moves into the next round: either a match already exists at
/// the target position and is updated in place, or a new match must be
/// created.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advancement {
    /// No match exists at the target position yet. `match_number` is the
    /// creation-order counter for the new match within its round.
    Create { target: Target, match_number: u32 },
    /// The sibling feeder already created the target match.
    Update { target: Target },
}

impl Advancement {
    /// Returns the [`Target`] of the advancement.
    #[inline]
    pub fn target(&self) -> Target {
        match *self {
            Self::Create { target, .. } => target,
            Self::Update { target } => target,
        }
    }
}

/// Pairs an ordered list of entrants into round-1 matches.
///
/// Entrants are paired two at a time in the order given; match `k` (1-based)
/// pairs the entrants at indices `2k - 2` and `2k - 1`. An odd trailing
/// entrant has no opponent and is excluded from the bracket entirely.
pub fn pair<T: Copy>(entrants: &[T]) -> Vec<(T, T)> {
    if entrants.len() % 2 != 0 {
        log::warn!(
            "Pairing {} entrants, the last one is left out of the bracket",
            entrants.len()
        );
    }

    entrants
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

/// Returns the [`Target`] slot fed by the winner of the match at
/// `(round, position)`.
///
/// `position` must be at least 1.
pub fn target(round: u32, position: u32) -> Target {
    debug_assert!(position >= 1);

    Target {
        round: round + 1,
        position: (position + 1) / 2,
        slot: if position % 2 == 1 {
            Slot::Team1
        } else {
            Slot::Team2
        },
    }
}

/// Decides how the winner of the match at `(round, position)` enters the next
/// round, given the positions of the matches that already exist in that round.
///
/// Returns [`Advancement::Update`] if the target position is already occupied,
/// otherwise [`Advancement::Create`] with the next match number for the round.
pub fn advancement(round: u32, position: u32, next_round_positions: &[u32]) -> Advancement {
    let target = target(round, position);

    if next_round_positions.contains(&target.position) {
        Advancement::Update { target }
    } else {
        Advancement::Create {
            target,
            match_number: next_round_positions.len() as u32 + 1,
        }
    }
}

/// Returns `true` if a bracket with `total` matches, `completed` of them
/// finished, counts as complete. An empty bracket is never complete.
#[inline]
pub fn is_complete(total: u64, completed: u64) -> bool {
    total > 0 && total == completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slot;

    #[test]
    fn test_pair() {
        let pairs = pair::<u64>(&[]);
        assert_eq!(pairs, vec![]);

        let pairs = pair(&[1, 2, 3, 4]);
        assert_eq!(pairs, vec![(1, 2), (3, 4)]);

        // An odd trailing entrant is dropped.
        let pairs = pair(&[1, 2, 3, 4, 5]);
        assert_eq!(pairs, vec![(1, 2), (3, 4)]);

        let pairs = pair(&[1]);
        assert_eq!(pairs, vec![]);
    }

    #[test]
    fn test_target() {
        // Odd positions fill the first slot, even positions the second.
        assert_eq!(
            target(1, 1),
            Target {
                round: 2,
                position: 1,
                slot: Slot::Team1
            }
        );
        assert_eq!(
            target(1, 2),
            Target {
                round: 2,
                position: 1,
                slot: Slot::Team2
            }
        );
        assert_eq!(
            target(1, 3),
            Target {
                round: 2,
                position: 2,
                slot: Slot::Team1
            }
        );
        assert_eq!(
            target(1, 4),
            Target {
                round: 2,
                position: 2,
                slot: Slot::Team2
            }
        );
        assert_eq!(
            target(2, 2),
            Target {
                round: 3,
                position: 1,
                slot: Slot::Team2
            }
        );
    }

    #[test]
    fn test_target_covers_next_round() {
        // The winners of n matches land in exactly ceil(n / 2) positions.
        for n in 1..=16u32 {
            let mut positions: Vec<u32> = (1..=n).map(|p| target(1, p).position).collect();
            positions.dedup();

            assert_eq!(positions.len() as u32, (n + 1) / 2);
            assert_eq!(*positions.last().unwrap(), (n + 1) / 2);
        }
    }

    #[test]
    fn test_advancement() {
        // First feeder of an empty round creates the match.
        assert_eq!(
            advancement(1, 1, &[]),
            Advancement::Create {
                target: Target {
                    round: 2,
                    position: 1,
                    slot: Slot::Team1
                },
                match_number: 1,
            }
        );

        // The sibling feeder updates it in place.
        assert_eq!(
            advancement(1, 2, &[1]),
            Advancement::Update {
                target: Target {
                    round: 2,
                    position: 1,
                    slot: Slot::Team2
                },
            }
        );

        // A feeder for a different slot of the round creates a second match.
        assert_eq!(
            advancement(1, 3, &[1]),
            Advancement::Create {
                target: Target {
                    round: 2,
                    position: 2,
                    slot: Slot::Team1
                },
                match_number: 2,
            }
        );
    }

    #[test]
    fn test_is_complete() {
        assert!(!is_complete(0, 0));
        assert!(!is_complete(3, 2));
        assert!(is_complete(3, 3));
        assert!(is_complete(1, 1));
    }

    /// Walks a full 4-team bracket through seeding and both advancement
    /// steps, tracking matches the way the server persists them.
    #[test]
    fn test_four_team_bracket() {
        #[derive(Debug, PartialEq)]
        struct Match {
            round: u32,
            number: u32,
            position: u32,
            team1: Option<u64>,
            team2: Option<u64>,
        }

        let teams = [1, 2, 3, 4];

        let mut matches: Vec<Match> = pair(&teams)
            .into_iter()
            .enumerate()
            .map(|(i, (team1, team2))| Match {
                round: 1,
                number: i as u32 + 1,
                position: i as u32 + 1,
                team1: Some(team1),
                team2: Some(team2),
            })
            .collect();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].team1, Some(1));
        assert_eq!(matches[0].team2, Some(2));
        assert_eq!(matches[1].team1, Some(3));
        assert_eq!(matches[1].team2, Some(4));

        let mut advance = |matches: &mut Vec<Match>, round: u32, position: u32, winner: u64| {
            let existing: Vec<u32> = matches
                .iter()
                .filter(|m| m.round == round + 1)
                .map(|m| m.position)
                .collect();

            match advancement(round, position, &existing) {
                Advancement::Create {
                    target,
                    match_number,
                } => {
                    let (team1, team2) = match target.slot {
                        Slot::Team1 => (Some(winner), None),
                        Slot::Team2 => (None, Some(winner)),
                    };

                    matches.push(Match {
                        round: target.round,
                        number: match_number,
                        position: target.position,
                        team1,
                        team2,
                    });
                }
                Advancement::Update { target } => {
                    let m = matches
                        .iter_mut()
                        .find(|m| m.round == target.round && m.position == target.position)
                        .unwrap();

                    match target.slot {
                        Slot::Team1 => m.team1 = Some(winner),
                        Slot::Team2 => m.team2 = Some(winner),
                    }
                }
            }
        };

        // Team 1 wins the first semifinal; the final is created with only
        // the first slot filled.
        advance(&mut matches, 1, 1, 1);
        assert_eq!(matches.len(), 3);
        assert_eq!(
            matches[2],
            Match {
                round: 2,
                number: 1,
                position: 1,
                team1: Some(1),
                team2: None,
            }
        );

        // Team 3 wins the second semifinal; the existing final is updated.
        advance(&mut matches, 1, 2, 3);
        assert_eq!(matches.len(), 3);
        assert_eq!(
            matches[2],
            Match {
                round: 2,
                number: 1,
                position: 1,
                team1: Some(1),
                team2: Some(3),
            }
        );
    }

    /// After every round-1 match of an 8-team bracket advances, round 2 holds
    /// exactly ceil(4 / 2) = 2 fully populated matches.
    #[test]
    fn test_eight_team_round_two() {
        let mut positions: Vec<u32> = Vec::new();
        let mut slots: Vec<(u32, Slot)> = Vec::new();

        for p in 1..=4u32 {
            let adv = advancement(1, p, &positions);
            let target = adv.target();

            if let Advancement::Create { match_number, .. } = adv {
                assert_eq!(match_number, positions.len() as u32 + 1);
                positions.push(target.position);
            }

            slots.push((target.position, target.slot));
        }

        assert_eq!(positions, vec![1, 2]);
        assert_eq!(
            slots,
            vec![
                (1, Slot::Team1),
                (1, Slot::Team2),
                (2, Slot::Team1),
                (2, Slot::Team2),
            ]
        );
    }
}
