//! Route modules, one per resource, each exposing a `router()` building a
//! `Router<Arc<AppState>>` mounted by `build_router` in `main`.

pub mod asset_items;
pub mod asset_models;
pub mod audit;
pub mod auth;
pub mod employees;
pub mod health;
pub mod loans;
pub mod stock_items;
pub mod users;
