// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

pub mod check;
pub mod commands;
pub mod config;
pub mod distiller;
pub mod error;
pub mod extract;
pub mod form;
pub mod format;
pub mod options;
pub mod pages;
pub mod serve;
pub mod service;
pub mod source;
pub mod validator;
