pub mod activity;
pub mod activity_participant;
pub mod activity_type;
pub mod activity_type_skill;
pub mod change_log;
pub mod delta_cursor;
pub mod elo_status;
pub mod skill_definition;
pub mod skill_rating;
pub mod skill_summary;
pub mod user_elo;

pub use activity::{Activity, CompletionStatus};
pub use activity_participant::{ActivityParticipant, FinalResult, ParticipantStatus};
pub use activity_type::{ActivityType, EloSettings};
pub use activity_type_skill::ActivityTypeSkill;
pub use change_log::{ChangeSource, ChangeType, EntityChangeLog, EntityType, NewChange};
pub use delta_cursor::{ClientType, UserDeltaCursor};
pub use elo_status::{ActivityEloStatus, EloStatus};
pub use skill_definition::{SkillDefinition, SkillType};
pub use skill_rating::UserActivitySkillRating;
pub use skill_summary::{Trend, UserActivityTypeSkillSummary, UserGeneralSkillSummary};
pub use user_elo::UserActivityTypeElo;
