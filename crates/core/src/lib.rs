pub mod config;
pub mod config_loader;
pub mod error;
pub mod exposure;
pub mod position;
pub mod traits;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, ExchangeConfig, ExposureConfig, ServerConfig};
pub use config_loader::ConfigLoader;
pub use error::{ExposureError, Result};
pub use exposure::{ledger_exposure, live_exposure, merge_exposure, NettingPolicy};
pub use position::{PositionBook, SymbolPosition};
pub use traits::{FightStore, FillStore, OrderActionStore, PositionSource};
pub use types::{
    normalize_symbol, Fight, FightParticipant, FightStatus, FillRecord, InsertOutcome,
    LivePosition, NewFill, OrderAction, ParticipantKey, Side, StakeInfo, User, WatermarkRefresh,
};
