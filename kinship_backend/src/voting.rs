//! Pure vote aggregation for polls.
//!
//! The aggregator takes the full unordered set of vote rows and reduces it to
//! per-poll, per-option counts plus the requesting user's own choice. It never
//! fails: rows referencing unknown polls or out-of-range option indices are
//! simply ignored when results are assembled.

use crate::database::models::{PollRecord, PollVoteRecord};
use serde::Serialize;
use std::collections::HashMap;

/// Reduction of a vote collection, keyed by poll id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VoteAggregate {
    /// poll id -> option index -> vote count
    pub counts: HashMap<String, HashMap<i64, u64>>,
    /// poll id -> the requesting user's chosen option index
    pub user_votes: HashMap<String, i64>,
}

pub fn aggregate(votes: &[PollVoteRecord], user_id: Option<&str>) -> VoteAggregate {
    let mut aggregate = VoteAggregate::default();
    for vote in votes {
        *aggregate
            .counts
            .entry(vote.poll_id.clone())
            .or_default()
            .entry(vote.option_index)
            .or_insert(0) += 1;
        if user_id == Some(vote.user_id.as_str()) {
            aggregate
                .user_votes
                .insert(vote.poll_id.clone(), vote.option_index);
        }
    }
    aggregate
}

/// `round(100 * count / total)`; a zero total is defined as 0%.
pub fn percentage(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionTally {
    pub label: String,
    pub votes: u64,
    pub percentage: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollTally {
    pub poll_id: String,
    pub total_votes: u64,
    pub options: Vec<OptionTally>,
    /// The requesting user's chosen option index, if they voted.
    pub user_vote: Option<i64>,
}

/// Joins the aggregate against a poll's stored option sequence. Display order
/// follows the sequence; vote rows whose index falls outside `[0, N)` are
/// dropped here.
pub fn tally_poll(poll: &PollRecord, aggregate: &VoteAggregate) -> PollTally {
    let empty = HashMap::new();
    let counts = aggregate.counts.get(&poll.id).unwrap_or(&empty);
    let total: u64 = counts
        .iter()
        .filter(|(index, _)| **index >= 0 && (**index as usize) < poll.options.len())
        .map(|(_, count)| *count)
        .sum();
    let options = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let votes = counts.get(&(index as i64)).copied().unwrap_or(0);
            OptionTally {
                label: label.clone(),
                votes,
                percentage: percentage(votes, total),
            }
        })
        .collect();
    PollTally {
        poll_id: poll.id.clone(),
        total_votes: total,
        options,
        user_vote: aggregate.user_votes.get(&poll.id).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_utc_iso;

    fn vote(poll_id: &str, user_id: &str, option_index: i64) -> PollVoteRecord {
        PollVoteRecord {
            id: format!("{poll_id}-{user_id}"),
            poll_id: poll_id.into(),
            user_id: user_id.into(),
            option_index,
            created_at: now_utc_iso(),
        }
    }

    fn poll(id: &str, question: &str, options: &[&str]) -> PollRecord {
        PollRecord {
            id: id.into(),
            question: question.into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            created_by: None,
            created_at: now_utc_iso(),
            closes_at: None,
        }
    }

    #[test]
    fn venue_scenario_counts_and_percentages() {
        let venue = poll("p1", "Venue?", &["Home", "Hall"]);
        let votes = vec![vote("p1", "a", 0), vote("p1", "b", 0), vote("p1", "c", 1)];

        let agg = aggregate(&votes, Some("c"));
        let tally = tally_poll(&venue, &agg);

        assert_eq!(tally.total_votes, 3);
        assert_eq!(tally.options[0].votes, 2);
        assert_eq!(tally.options[1].votes, 1);
        assert_eq!(tally.options[0].percentage, 67);
        assert_eq!(tally.options[1].percentage, 33);
        assert_eq!(tally.user_vote, Some(1));
    }

    #[test]
    fn zero_votes_means_zero_percent_everywhere() {
        let empty = poll("p1", "Anything?", &["Yes", "No", "Maybe"]);
        let tally = tally_poll(&empty, &aggregate(&[], None));
        assert_eq!(tally.total_votes, 0);
        for option in &tally.options {
            assert_eq!(option.votes, 0);
            assert_eq!(option.percentage, 0);
        }
    }

    #[test]
    fn out_of_range_indices_are_excluded_from_tallies() {
        let p = poll("p1", "Pick", &["A", "B"]);
        let votes = vec![
            vote("p1", "a", 0),
            vote("p1", "b", 5),
            vote("p1", "c", -1),
        ];
        let tally = tally_poll(&p, &aggregate(&votes, None));
        assert_eq!(tally.total_votes, 1);
        assert_eq!(tally.options[0].votes, 1);
        assert_eq!(tally.options[1].votes, 0);
    }

    #[test]
    fn votes_for_unknown_polls_do_not_disturb_other_tallies() {
        let p = poll("p1", "Pick", &["A", "B"]);
        let votes = vec![vote("p1", "a", 1), vote("ghost", "a", 0)];
        let agg = aggregate(&votes, Some("a"));
        let tally = tally_poll(&p, &agg);
        assert_eq!(tally.total_votes, 1);
        assert_eq!(tally.user_vote, Some(1));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let votes = vec![vote("p1", "a", 0), vote("p2", "a", 1), vote("p1", "b", 1)];
        assert_eq!(aggregate(&votes, Some("a")), aggregate(&votes, Some("a")));
    }

    #[test]
    fn sum_of_option_counts_matches_valid_rows() {
        let p = poll("p1", "Pick", &["A", "B", "C"]);
        let votes = vec![
            vote("p1", "u1", 0),
            vote("p1", "u2", 1),
            vote("p1", "u3", 2),
            vote("p1", "u4", 2),
            vote("p1", "u5", 9), // invalid
        ];
        let tally = tally_poll(&p, &aggregate(&votes, None));
        let sum: u64 = tally.options.iter().map(|o| o.votes).sum();
        assert_eq!(sum, 4);
        assert_eq!(tally.total_votes, 4);
    }
}
