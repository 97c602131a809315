//! Pure, deterministic ELO computation. Takes a full roster snapshot
//! and returns rating deltas; has no knowledge of the database or of locking,
//! so it can be unit tested without a pool and reused by both the activity
//! orchestrator and any offline recompute tooling.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::activity_participant::FinalResult;
use crate::models::activity_type::EloSettings;

/// Floor below which no rating is allowed to fall, regardless of how lopsided
/// a result was.
const MINIMUM_RATING: i32 = 100;

/// Volatility above which the new-player K-factor gets an extra boost, one
/// tenth of a point of K per point of volatility past this baseline.
const BASELINE_VOLATILITY: i32 = 300;

/// Games played at or past which a player leaves the `established` tier for
/// `expert`.
const EXPERT_THRESHOLD_GAMES: i32 = 100;

#[derive(Debug, Clone)]
pub struct ParticipantInput {
    pub user_id: Uuid,
    pub rating: i32,
    pub games_played: i32,
    /// Rating volatility; a provisional player with a high volatility gets a
    /// larger K-factor boost so their rating converges faster.
    pub volatility: i32,
    pub team_id: Option<Uuid>,
    pub final_result: Option<FinalResult>,
    /// Rank within the activity, 1-based, lower is better. Used as a fallback
    /// for individual-mode activities whose outcome isn't one of the three
    /// directly comparable `final_result` cases.
    pub position: Option<i32>,
    /// Precomputed skill-rating nudge to add to the raw ELO delta before the
    /// floor is applied, `0` when the activity type has no skill influence
    /// configured or no ratings were recorded for this participant.
    pub skill_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EloChange {
    pub user_id: Uuid,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
    pub new_games_played: i32,
}

/// K-factor tier, chosen from games played against the activity type's
/// configured thresholds. Provisional players additionally get `k_new`
/// boosted by how far their volatility sits above the baseline, so a newly
/// added player who is already swinging wildly converges faster than one who
/// looks stable.
fn k_factor_for(games_played: i32, volatility: i32, settings: &EloSettings) -> f64 {
    if games_played < settings.provisional_games {
        let boost = (volatility - BASELINE_VOLATILITY).max(0) as f64 / 10.0;
        settings.k_factor.new as f64 + boost
    } else if games_played < EXPERT_THRESHOLD_GAMES {
        settings.k_factor.established as f64
    } else {
        settings.k_factor.expert as f64
    }
}

/// Standard logistic expected-score formula: the probability `a` beats `b`.
///
/// ```
/// # use league_backend::services::elo_engine::expected_score;
/// let e = expected_score(1200, 1200);
/// assert!((e - 0.5).abs() < 1e-9);
/// ```
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) as f64 / 400.0))
}

fn actual_score(result: FinalResult) -> f64 {
    match result {
        FinalResult::Win => 1.0,
        FinalResult::Draw => 0.5,
        FinalResult::Loss => 0.0,
    }
}

/// Applies the rating floor and rounds to the nearest integer.
fn floor_rating(raw: f64) -> i32 {
    (raw.round() as i32).max(MINIMUM_RATING)
}

/// Computes ELO deltas for one completed activity.
///
/// Team-based activity types compare each participant against the average
/// rating of every opposing team, weighted by that team's recorded result.
/// Non-team activity types compare every participant against every other
/// participant pairwise, primarily by each pair's own `final_result`
/// (win/loss/draw), falling back to finishing `position` only when the pair's
/// results don't directly resolve a winner (e.g. two participants who both
/// recorded a win in a free-for-all).
pub fn calculate_elo_changes(
    participants: &[ParticipantInput],
    settings: &EloSettings,
) -> Result<Vec<EloChange>> {
    if participants.len() < settings.minimum_participants as usize {
        return Err(AppError::InsufficientParticipants(format!(
            "need at least {} participants, got {}",
            settings.minimum_participants,
            participants.len()
        )));
    }

    if settings.team_based {
        calculate_team_based(participants, settings)
    } else {
        calculate_position_based(participants, settings)
    }
}

fn calculate_team_based(
    participants: &[ParticipantInput],
    settings: &EloSettings,
) -> Result<Vec<EloChange>> {
    use std::collections::BTreeMap;

    let mut teams: BTreeMap<Uuid, Vec<&ParticipantInput>> = BTreeMap::new();
    for p in participants {
        let team_id = p
            .team_id
            .ok_or_else(|| AppError::Validation("team-based activity requires team_id".into()))?;
        teams.entry(team_id).or_default().push(p);
    }

    if teams.len() < 2 {
        return Err(AppError::InsufficientTeams(format!(
            "need at least 2 teams, got {}",
            teams.len()
        )));
    }

    let team_averages: BTreeMap<Uuid, f64> = teams
        .iter()
        .map(|(team_id, members)| {
            let avg = members.iter().map(|m| m.rating as f64).sum::<f64>() / members.len() as f64;
            (*team_id, avg)
        })
        .collect();

    let mut changes = Vec::with_capacity(participants.len());
    for (team_id, members) in &teams {
        let own_avg = team_averages[team_id];
        let opponents: Vec<(&Uuid, &f64)> =
            team_averages.iter().filter(|(id, _)| *id != team_id).collect();

        let expected: f64 = opponents.iter().map(|(_, avg)| expected_score(own_avg as i32, **avg as i32)).sum::<f64>()
            / opponents.len() as f64;

        for member in members {
            let result = member.final_result.ok_or_else(|| {
                AppError::Validation(format!("participant {} missing final_result", member.user_id))
            })?;
            let actual = actual_score(result);
            let k = k_factor_for(member.games_played, member.volatility, settings);
            let delta_raw = k * (actual - expected);
            let new_rating = floor_rating(member.rating as f64 + delta_raw + member.skill_bonus as f64);
            changes.push(EloChange {
                user_id: member.user_id,
                old_rating: member.rating,
                new_rating,
                delta: new_rating - member.rating,
                new_games_played: member.games_played + 1,
            });
        }
    }

    Ok(changes)
}

/// Resolves the actual score for `p` against `opponent` from their recorded
/// `final_result`s where the pair directly compares (win/loss, loss/win,
/// draw/draw); any other combination (e.g. both recorded a win in a
/// free-for-all) falls back to comparing finishing `position`.
fn pairwise_actual_score(p: &ParticipantInput, opponent: &ParticipantInput, allow_draws: bool) -> Result<f64> {
    match (p.final_result, opponent.final_result) {
        (Some(FinalResult::Win), Some(FinalResult::Loss)) => return Ok(1.0),
        (Some(FinalResult::Loss), Some(FinalResult::Win)) => return Ok(0.0),
        (Some(FinalResult::Draw), Some(FinalResult::Draw)) => {
            if allow_draws {
                return Ok(0.5);
            }
            return Err(AppError::Validation("tied results not allowed for this activity type".into()));
        }
        _ => {}
    }

    let position = p
        .position
        .ok_or_else(|| AppError::Validation(format!("participant {} missing position", p.user_id)))?;
    let opponent_position = opponent
        .position
        .ok_or_else(|| AppError::Validation(format!("participant {} missing position", opponent.user_id)))?;

    Ok(match position.cmp(&opponent_position) {
        std::cmp::Ordering::Less => 1.0,
        std::cmp::Ordering::Equal => {
            if allow_draws {
                0.5
            } else {
                return Err(AppError::Validation("tied positions not allowed for this activity type".into()));
            }
        }
        std::cmp::Ordering::Greater => 0.0,
    })
}

fn calculate_position_based(
    participants: &[ParticipantInput],
    settings: &EloSettings,
) -> Result<Vec<EloChange>> {
    let mut changes = Vec::with_capacity(participants.len());

    for p in participants {
        let mut expected_sum = 0.0;
        let mut actual_sum = 0.0;
        let mut opponent_count = 0;

        for opponent in participants {
            if opponent.user_id == p.user_id {
                continue;
            }
            expected_sum += expected_score(p.rating, opponent.rating);
            actual_sum += pairwise_actual_score(p, opponent, settings.allow_draws)?;
            opponent_count += 1;
        }

        let k = k_factor_for(p.games_played, p.volatility, settings);
        let delta_raw = if opponent_count == 0 {
            0.0
        } else {
            k * (actual_sum - expected_sum) / opponent_count as f64
        };

        let new_rating = floor_rating(p.rating as f64 + delta_raw + p.skill_bonus as f64);
        changes.push(EloChange {
            user_id: p.user_id,
            old_rating: p.rating,
            new_rating,
            delta: new_rating - p.rating,
            new_games_played: p.games_played + 1,
        });
    }

    Ok(changes)
}

/// Skill-rating-influenced nudge to an ELO delta: the gap between a
/// participant's confidence-weighted average rating received in this
/// activity and their historical per-type average, scaled into ELO points by
/// `skill_influence`. `historical_average` falls back to `5.0` (mid-scale)
/// when the participant has no prior skill summary yet.
///
/// ```
/// # use league_backend::services::elo_engine::skill_bonus;
/// // rated exactly at their historical baseline: no nudge
/// assert_eq!(skill_bonus(7.0, 7.0, 0.2), 0);
/// ```
pub fn skill_bonus(activity_average: f64, historical_average: f64, skill_influence: f64) -> i32 {
    (((activity_average - historical_average) / 5.0) * 20.0 * skill_influence).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity_type::{EloSettings, KFactor};

    fn settings(team_based: bool) -> EloSettings {
        EloSettings {
            starting_elo: 1200,
            k_factor: KFactor { new: 40, established: 20, expert: 10 },
            provisional_games: 10,
            minimum_participants: 2,
            team_based,
            allow_draws: true,
            skill_influence: 0.2,
        }
    }

    fn participant(user_id: Uuid, rating: i32, games_played: i32, final_result: Option<FinalResult>) -> ParticipantInput {
        ParticipantInput {
            user_id,
            rating,
            games_played,
            volatility: BASELINE_VOLATILITY,
            team_id: None,
            final_result,
            position: None,
            skill_bonus: 0,
        }
    }

    #[test]
    fn equal_ratings_1v1_win_gains_half_k() {
        let settings = settings(false);
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        let participants = vec![
            participant(winner, 1200, 0, Some(FinalResult::Win)),
            participant(loser, 1200, 0, Some(FinalResult::Loss)),
        ];
        let changes = calculate_elo_changes(&participants, &settings).unwrap();
        assert_eq!(changes.iter().find(|c| c.user_id == winner).unwrap().delta, 20);
        assert_eq!(changes.iter().find(|c| c.user_id == loser).unwrap().delta, -20);
    }

    #[test]
    fn draw_between_equal_ratings_has_no_effect() {
        let settings = settings(false);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let participants =
            vec![participant(a, 1200, 0, Some(FinalResult::Draw)), participant(b, 1200, 0, Some(FinalResult::Draw))];
        let changes = calculate_elo_changes(&participants, &settings).unwrap();
        assert!(changes.iter().all(|c| c.delta == 0));
    }

    #[test]
    fn ambiguous_same_result_falls_back_to_position() {
        // A free-for-all where three players each record a "win" at their
        // table; position breaks the tie for pairwise comparison.
        let settings = settings(false);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let participants = vec![
            ParticipantInput {
                position: Some(1),
                ..participant(first, 1200, 0, Some(FinalResult::Win))
            },
            ParticipantInput {
                position: Some(2),
                ..participant(second, 1200, 0, Some(FinalResult::Win))
            },
        ];
        let changes = calculate_elo_changes(&participants, &settings).unwrap();
        assert!(changes.iter().find(|c| c.user_id == first).unwrap().delta > 0);
        assert!(changes.iter().find(|c| c.user_id == second).unwrap().delta < 0);
    }

    #[test]
    fn insufficient_participants_rejected() {
        let settings = settings(false);
        let participants = vec![participant(Uuid::new_v4(), 1200, 0, Some(FinalResult::Win))];
        let err = calculate_elo_changes(&participants, &settings).unwrap_err();
        assert!(matches!(err, AppError::InsufficientParticipants(_)));
    }

    #[test]
    fn team_based_requires_at_least_two_teams() {
        let settings = settings(true);
        let team_id = Uuid::new_v4();
        let participants = vec![
            ParticipantInput { team_id: Some(team_id), ..participant(Uuid::new_v4(), 1200, 0, Some(FinalResult::Win)) },
            ParticipantInput { team_id: Some(team_id), ..participant(Uuid::new_v4(), 1200, 0, Some(FinalResult::Win)) },
        ];
        let err = calculate_elo_changes(&participants, &settings).unwrap_err();
        assert!(matches!(err, AppError::InsufficientTeams(_)));
    }

    #[test]
    fn established_player_moves_less_than_new_player() {
        let settings = settings(false);
        let new_player = Uuid::new_v4();
        let veteran = Uuid::new_v4();
        let participants = vec![
            participant(new_player, 1200, 0, Some(FinalResult::Win)),
            participant(veteran, 1200, 50, Some(FinalResult::Loss)),
        ];
        let changes = calculate_elo_changes(&participants, &settings).unwrap();
        let new_delta = changes.iter().find(|c| c.user_id == new_player).unwrap().delta;
        let veteran_delta = changes.iter().find(|c| c.user_id == veteran).unwrap().delta.abs();
        assert!(new_delta > veteran_delta);
    }

    #[test]
    fn high_volatility_provisional_player_gets_boosted_k() {
        let settings = settings(false);
        let calm = Uuid::new_v4();
        let volatile = Uuid::new_v4();
        let opponent_a = Uuid::new_v4();
        let opponent_b = Uuid::new_v4();

        let calm_changes = calculate_elo_changes(
            &[
                ParticipantInput { volatility: 300, ..participant(calm, 1200, 0, Some(FinalResult::Win)) },
                participant(opponent_a, 1200, 0, Some(FinalResult::Loss)),
            ],
            &settings,
        )
        .unwrap();
        let volatile_changes = calculate_elo_changes(
            &[
                ParticipantInput { volatility: 500, ..participant(volatile, 1200, 0, Some(FinalResult::Win)) },
                participant(opponent_b, 1200, 0, Some(FinalResult::Loss)),
            ],
            &settings,
        )
        .unwrap();

        let calm_delta = calm_changes.iter().find(|c| c.user_id == calm).unwrap().delta;
        let volatile_delta = volatile_changes.iter().find(|c| c.user_id == volatile).unwrap().delta;
        assert!(volatile_delta > calm_delta);
    }

    #[test]
    fn rating_never_falls_below_the_floor() {
        let settings = settings(false);
        let underdog = Uuid::new_v4();
        let champion = Uuid::new_v4();
        let participants = vec![
            participant(underdog, 100, 0, Some(FinalResult::Loss)),
            participant(champion, 2800, 0, Some(FinalResult::Win)),
        ];
        let changes = calculate_elo_changes(&participants, &settings).unwrap();
        let underdog_change = changes.iter().find(|c| c.user_id == underdog).unwrap();
        assert_eq!(underdog_change.new_rating, 100);
    }

    #[test]
    fn skill_bonus_is_zero_at_baseline() {
        assert_eq!(skill_bonus(7.0, 7.0, 0.2), 0);
    }

    #[test]
    fn skill_bonus_is_positive_above_baseline() {
        assert!(skill_bonus(9.0, 5.0, 0.2) > 0);
    }
}
