//! The participant pool.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One opted-in entrant, keyed by sender address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Added(Participant),
    /// The sender was already in; carries the name they joined with.
    AlreadyJoined(Participant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("no participants")]
    EmptyPool,
    #[error("invalid winner count {0}")]
    InvalidCount(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantPool {
    participants: Vec<Participant>,
}

impl ParticipantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from stored records, dropping repeated ids.
    pub fn from_records(records: Vec<Participant>) -> Self {
        let mut pool = Self::new();
        for record in records {
            pool.join(record.id, record.name);
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Add `id` unless it is already present. The first name wins.
    pub fn join(&mut self, id: impl Into<String>, name: impl Into<String>) -> JoinOutcome {
        let id = id.into();
        if let Some(existing) = self.participants.iter().find(|p| p.id == id) {
            return JoinOutcome::AlreadyJoined(existing.clone());
        }
        let participant = Participant {
            id,
            name: name.into(),
        };
        self.participants.push(participant.clone());
        JoinOutcome::Added(participant)
    }

    /// Pick winners by uniform shuffle and empty the pool.
    ///
    /// `requested` above the pool size is clamped down. On error the pool is
    /// left untouched.
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        requested: i64,
        rng: &mut R,
    ) -> Result<Vec<Participant>, DrawError> {
        if self.participants.is_empty() {
            return Err(DrawError::EmptyPool);
        }
        if requested < 1 {
            return Err(DrawError::InvalidCount(requested));
        }
        let count = usize::try_from(requested)
            .unwrap_or(usize::MAX)
            .min(self.participants.len());

        let mut drawn = std::mem::take(&mut self.participants);
        drawn.shuffle(rng);
        drawn.truncate(count);
        Ok(drawn)
    }

    /// Put back entrants from an abandoned draw ahead of anyone who joined
    /// since. An id in both keeps its entrant entry.
    pub fn restore(&mut self, entrants: Vec<Participant>) {
        let joined_since = std::mem::take(&mut self.participants);
        for participant in entrants.into_iter().chain(joined_since) {
            self.join(participant.id, participant.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool_of(names: &[&str]) -> ParticipantPool {
        let mut pool = ParticipantPool::new();
        for (i, name) in names.iter().enumerate() {
            pool.join(format!("{}@s.whatsapp.net", i + 1), *name);
        }
        pool
    }

    #[test]
    fn test_first_name_wins() {
        let mut pool = ParticipantPool::new();
        assert!(matches!(pool.join("s", "Ana"), JoinOutcome::Added(_)));
        match pool.join("s", "Beatriz") {
            JoinOutcome::AlreadyJoined(existing) => assert_eq!(existing.name, "Ana"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.participants()[0].name, "Ana");
    }

    #[test]
    fn test_draw_clamps_and_empties() {
        let mut pool = pool_of(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(7);

        let winners = pool.draw(5, &mut rng).unwrap();
        assert_eq!(winners.len(), 3);
        let mut names: Vec<_> = winners.iter().map(|w| w.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_draw_errors_leave_pool_alone() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty = ParticipantPool::new();
        assert_eq!(empty.draw(1, &mut rng), Err(DrawError::EmptyPool));

        let mut pool = pool_of(&["A", "B"]);
        assert_eq!(pool.draw(0, &mut rng), Err(DrawError::InvalidCount(0)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_draw_winners_are_distinct() {
        let mut pool = pool_of(&["A", "B", "C", "D", "E", "F"]);
        let mut rng = StdRng::seed_from_u64(42);

        let mut ids: Vec<_> = pool
            .draw(4, &mut rng)
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_restore_keeps_order_and_later_joins() {
        let mut pool = pool_of(&["A", "B"]);
        let entrants = pool.participants().to_vec();
        pool.draw(1, &mut StdRng::seed_from_u64(9)).unwrap();
        pool.join("9@s.whatsapp.net", "Z");
        pool.join("1@s.whatsapp.net", "A2");

        pool.restore(entrants);

        let names: Vec<_> = pool.participants().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "Z"]);
    }

    #[test]
    fn test_from_records_dedups() {
        let pool = ParticipantPool::from_records(vec![
            Participant { id: "1".into(), name: "A".into() },
            Participant { id: "1".into(), name: "B".into() },
            Participant { id: "2".into(), name: "C".into() },
        ]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.participants()[0].name, "A");
    }
}
