//! # Email Operator
//!
//! A Kubernetes operator that sends `Email` resources through MailerSend.
//!
//! ## Overview
//!
//! 1. **EmailSenderConfig** - holds the sender address and MailerSend API
//!    token; protected by a finalizer while emails still need it
//! 2. **Email** - recipient, subject and HTML body; sent at most once and
//!    recorded in status as `Sent` with the provider message id or `Failed`
//!    with a reason
//!
//! ## Usage
//!
//! ```bash
//! email-operator --leader-elect \
//!   --metrics-bind-address 0.0.0.0:8080 \
//!   --health-probe-bind-address 0.0.0.0:8081
//! ```

use anyhow::Result;
use clap::Parser;
use email_operator::config::Args;
use email_operator::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let init = initialization::initialize(&args).await?;
    watch_loop::run(&args, init).await
}
