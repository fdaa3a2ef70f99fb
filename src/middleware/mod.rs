// SPDX-License-Identifier: MIT

//! Middleware: session authentication and security headers.

pub mod auth;
pub mod security;
