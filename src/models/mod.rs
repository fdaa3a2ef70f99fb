// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod catalog;
pub mod library;
pub mod purchase;
pub mod user;

pub use library::{FavoriteRecord, HistoryDoc, HistoryEntry, Playlist, TrackSnapshot};
pub use purchase::{ItemType, Purchase, PurchaseStatus};
pub use user::{StoredCatalogTokens, User, UserRole};
