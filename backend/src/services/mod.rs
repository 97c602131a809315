pub mod activity_orchestrator;
pub mod change_log;
pub mod cursor_store;
pub mod delta_reader;
pub mod elo_engine;
pub mod elo_lock;
pub mod elo_persister;
pub mod skill_rating_ingest;
pub mod skill_summary;
pub mod suspicious_pattern;
pub mod team_balance;
