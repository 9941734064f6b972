//! SocialConnect backend library.
//!
//! A JSON API for a small social network: accounts, posts with photo and
//! video uploads, threaded comments, likes, friendships, blocking, content
//! reports with an admin queue, and a reverse-geocoding proxy.

#![allow(clippy::needless_raw_string_hashes)]

pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod geocode;
pub mod media;
pub mod pagination;
pub mod web;
