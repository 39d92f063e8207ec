pub mod delivery;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod storage;
pub mod trigger;
