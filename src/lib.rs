pub mod config;
pub mod engine;
pub mod feed;
pub mod gateway;
pub mod journal;
pub mod levels;
pub mod models;
pub mod persistence;
pub mod position;
pub mod schedule;
pub mod signal;

pub use config::{load_watchlist, MarketKind, ProductKind, SymbolConfig};
pub use engine::Engine;
pub use feed::{CandleSource, CsvCandleSource, PriceBoard};
pub use gateway::{OrderGateway, PaperGateway};
pub use journal::Journal;
pub use models::{Candle, Direction, LevelSet, OrderAck, OrderRequest, SignalCandle};
pub use persistence::{StateSnapshot, StateStore};
pub use position::{PositionState, Stage, SymbolTrader};
