mod basic;
mod batching;
mod cancellation;
mod error_modes;
mod ordering;
mod streaming;
