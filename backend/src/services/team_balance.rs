//! Greedy team-balancing heuristic backing the `/activities/{id}/balance-teams`
//! endpoint. Pure function over ratings so it can run ahead of an
//! activity even being scheduled for completion.

use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy)]
pub struct RatedUser {
    pub user_id: Uuid,
    pub rating: i32,
}

#[derive(Debug, Clone)]
pub struct TeamAssignment {
    pub team_index: usize,
    pub user_id: Uuid,
}

/// Splits `users` into `team_count` teams by repeatedly handing the next
/// highest-rated remaining user to whichever team currently has the lowest
/// total rating, snake-draft style. Deterministic given the same input
/// order, so the same roster always balances the same way.
pub fn balance_teams(users: &[RatedUser], team_count: usize) -> Result<Vec<TeamAssignment>> {
    if team_count < 2 {
        return Err(AppError::InsufficientTeams(format!(
            "need at least 2 teams, got {team_count}"
        )));
    }
    if users.len() < team_count {
        return Err(AppError::InsufficientParticipants(format!(
            "need at least {team_count} participants to form {team_count} teams, got {}",
            users.len()
        )));
    }

    let mut sorted: Vec<RatedUser> = users.to_vec();
    sorted.sort_by(|a, b| b.rating.cmp(&a.rating));

    let mut team_totals = vec![0i64; team_count];
    let mut assignments = Vec::with_capacity(sorted.len());

    for user in sorted {
        let (team_index, _) = team_totals
            .iter()
            .enumerate()
            .min_by_key(|(_, total)| **total)
            .expect("team_count >= 2 guarantees a non-empty team_totals");
        team_totals[team_index] += user.rating as i64;
        assignments.push(TeamAssignment { team_index, user_id: user.user_id });
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(rating: i32) -> RatedUser {
        RatedUser { user_id: Uuid::new_v4(), rating }
    }

    #[test]
    fn splits_evenly_matched_ratings_across_two_teams() {
        let users = vec![user(1200), user(1200), user(1200), user(1200)];
        let assignments = balance_teams(&users, 2).unwrap();
        let team_0 = assignments.iter().filter(|a| a.team_index == 0).count();
        let team_1 = assignments.iter().filter(|a| a.team_index == 1).count();
        assert_eq!(team_0, 2);
        assert_eq!(team_1, 2);
    }

    #[test]
    fn balances_total_rating_not_just_headcount() {
        let users = vec![user(2000), user(1000), user(1000), user(1000)];
        let assignments = balance_teams(&users, 2).unwrap();
        let totals: Vec<i64> = (0..2)
            .map(|team| {
                assignments
                    .iter()
                    .filter(|a| a.team_index == team)
                    .map(|a| users.iter().find(|u| u.user_id == a.user_id).unwrap().rating as i64)
                    .sum()
            })
            .collect();
        assert!((totals[0] - totals[1]).abs() <= 1000);
    }

    #[test]
    fn rejects_too_few_participants() {
        let users = vec![user(1200)];
        let err = balance_teams(&users, 2).unwrap_err();
        assert!(matches!(err, AppError::InsufficientParticipants(_)));
    }

    #[test]
    fn rejects_fewer_than_two_teams() {
        let users = vec![user(1200), user(1300)];
        let err = balance_teams(&users, 1).unwrap_err();
        assert!(matches!(err, AppError::InsufficientTeams(_)));
    }
}
