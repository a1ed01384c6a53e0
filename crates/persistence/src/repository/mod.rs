//! Repositories, one per aggregate root

pub mod alerts;
pub mod portfolio;
pub mod users;
pub mod watchlist;

pub use alerts::AlertRepository;
pub use portfolio::PortfolioRepository;
pub use users::UserRepository;
pub use watchlist::WatchlistRepository;
