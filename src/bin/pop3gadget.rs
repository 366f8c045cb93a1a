//! Development entry point: walks the default mailbox with the given
//! credentials.
//!
//! `pop3gadget -Username <name> -Password <secret>`
//!
//! Wire traces go to stderr; `RUST_LOG` picks the level (default `info`).

extern crate pop3gadget;
extern crate tracing_subscriber;

use std::env;
use std::io;
use std::process;

use pop3gadget::session;
use pop3gadget::{Config, POP3Connection};
use tracing_subscriber::prelude::*;

fn flag_value(args: &[String], name: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let trimmed = arg.trim_start_matches('-');
        if trimmed == name && arg.starts_with('-') {
            return iter.next().cloned();
        }
        let prefix = format!("{}=", name);
        if arg.starts_with('-') && trimmed.starts_with(&prefix[..]) {
            return Some(trimmed[prefix.len()..].to_string());
        }
    }
    None
}

fn main() {
    // The library logs through `log`; `init` also bridges those records.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pop3gadget=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let username = flag_value(&args, "Username").unwrap_or_default();
    let password = flag_value(&args, "Password").unwrap_or_default();

    let config = Config::default().with_credentials(&username, &password);
    let mut conn = POP3Connection::new(config);
    match session::run(&mut conn) {
        Ok(report) => {
            println!("{} messages, {} octets", report.stat.num_mails, report.stat.mbox_size);
            for email in &report.messages {
                println!("{}\t{}", email.id, email.size);
            }
        }
        Err(e) => {
            eprintln!("pop3gadget: {}", e);
            for cause in e.iter().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            process::exit(1);
        }
    }
}
