// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A framework for notifying users about what tools are doing.

Library code never prints anything directly. Operations that may need to tell
the user about something unusual (for instance, a data file whose internal
bookkeeping disagrees with its manifest) take a `&mut dyn NotificationBackend`
and report through it with the `rn_note!`, `rn_warning!`, `rn_severe!`, and
`rn_fatal!` macros. Programs decide what happens to those notifications: drop
them, buffer them, or print them to the terminal with colors (the latter when
the `notifications` feature is enabled).

*/

#[cfg(feature = "notifications")]
pub mod termcolor;

use anyhow::Error;
use std::fmt::Arguments;

/// How chatty the notification system should be.
#[repr(usize)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ChatterLevel {
    /// A minimal level of output: only warnings and errors will be reported.
    Minimal = 0,

    /// The normal level of output: informational messages will be reported.
    Normal,

    /// Everything, including backtraces attached to errors.
    Verbose,
}

/// The kind of notification that is being produced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotificationKind {
    /// An informational notice.
    Note,

    /// Warning of an unusual condition; the program will likely perform as intended.
    Warning,

    /// Notification of a severe problem; the program will likely fail but will attempt to contine.
    Severe,

    /// Notification of a fatal error; the program must give up.
    Fatal,
}

/// Trait for type that handle notifications to the user.
pub trait NotificationBackend {
    /// Notify the user about an event.
    ///
    /// If `err` is not `None`, the information contained in the object should
    /// be reported after the main message.
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>);
}

/// Send an informational notification to the user.
///
/// Standard usage looks like this:
///
/// ```rust,ignore
/// rn_note!(nb, "loaded {} rows", n_rows);
/// ```
///
/// where `nb` is a type implementing the NotificationBackend trait. You may
/// also provide an Error value after a semicolon; the information it contains
/// will be printed after the informational message. This is not expected to
/// be common usage for this particular macro, but makes more sense for the
/// `rn_warning!`, `rn_severe!`, and `rn_fatal!` macros.
#[macro_export]
macro_rules! rn_note {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Warn the user of a problematic condition.
///
/// See the documentation of `rn_note!` for usage information. This macro
/// should be used when an unusual condition has been detected, but the task
/// at hand will likely succeed.
#[macro_export]
macro_rules! rn_warning {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Notify the user of a severe problem.
///
/// See the documentation of `rn_note!` for usage information. This macro
/// should be used when an issue has been detected that makes it likely that
/// the task at hand cannot be completed successfully; however, the program
/// will attempt to continue.
#[macro_export]
macro_rules! rn_severe {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Notify the user of a fatal problem.
///
/// See the documentation of `rn_note!` for usage information. If the
/// command-line interface is being used, it will probably exit almost
/// immediately after a fatal notification is issued.
#[macro_export]
macro_rules! rn_fatal {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// A no-op notification backend.
///
/// This empty structure implements the NotificationBackend trait. Its
/// `notify()` function does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationBackend {}

impl NoopNotificationBackend {
    /// Create a new NoopNotificationBackend object.
    pub fn new() -> NoopNotificationBackend {
        NoopNotificationBackend {}
    }
}

impl NotificationBackend for NoopNotificationBackend {
    fn notify(&mut self, _kind: NotificationKind, _args: Arguments, _err: Option<Error>) {}
}

#[derive(Debug)]
struct NotificationData {
    kind: NotificationKind,
    text: String,
    err: Option<Error>,
}

/// A notification backend that buffers notifications and emits them later.
///
/// The buffered messages can also be inspected, which is how tests check
/// that a warning was (or was not) issued.
#[derive(Debug, Default)]
pub struct BufferingNotificationBackend {
    buf: Vec<NotificationData>,
}

impl BufferingNotificationBackend {
    /// Create and return a new BufferingNotificationBackend.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Get the number of buffered notifications.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Return true if nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Iterate over the kinds and texts of the buffered notifications.
    pub fn messages(&self) -> impl Iterator<Item = (NotificationKind, &str)> + '_ {
        self.buf.iter().map(|n| (n.kind, n.text.as_str()))
    }

    /// Count the buffered notifications of a given kind.
    pub fn count_kind(&self, kind: NotificationKind) -> usize {
        self.buf.iter().filter(|n| n.kind == kind).count()
    }

    /// Empty the buffered notifications into a different notification backend.
    ///
    /// This function consumes the object.
    pub fn drain<B: NotificationBackend + ?Sized>(mut self, other: &mut B) {
        for info in self.buf.drain(..) {
            other.notify(info.kind, format_args!("{}", info.text), info.err);
        }
    }
}

impl NotificationBackend for BufferingNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        self.buf.push(NotificationData {
            kind,
            text: format!("{}", args),
            err,
        });
    }
}

/// An extension trait for adding standard notification arguments to a clap
/// Command object.
#[cfg(feature = "notifications")]
pub trait ClapNotificationArgsExt {
    /// Add standard Rubbl notification-related arguments to this Command.
    fn rubbl_notify_args(self) -> Self;
}

#[cfg(feature = "notifications")]
impl ClapNotificationArgsExt for clap::Command {
    fn rubbl_notify_args(self) -> Self {
        self.arg(
            clap::Arg::new("chatter_level")
                .long("chatter")
                .short('c')
                .value_name("LEVEL")
                .help("How much chatter to print when running")
                .value_parser(["default", "minimal", "verbose"])
                .default_value("default"),
        )
    }
}

/// Run a function with colorized reporting of errors.
///
/// The return value is suitable for passing to `std::process::exit`.
#[cfg(feature = "notifications")]
pub fn run_with_notifications<E, F>(matches: clap::ArgMatches, inner: F) -> i32
where
    E: Into<Error>,
    F: FnOnce(clap::ArgMatches, &mut dyn NotificationBackend) -> Result<i32, E>,
{
    let chatter = match matches
        .get_one::<String>("chatter_level")
        .map(|s| s.as_str())
    {
        Some("minimal") => ChatterLevel::Minimal,
        Some("verbose") => ChatterLevel::Verbose,
        _ => ChatterLevel::Normal,
    };

    let mut tnb = termcolor::TermcolorNotificationBackend::new(chatter);

    match inner(matches, &mut tnb) {
        Ok(ret) => ret,

        Err(e) => {
            tnb.bare_error(e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffering_keeps_order_and_kinds() {
        let mut nb = BufferingNotificationBackend::new();
        rn_note!(nb, "loaded {} rows", 3);
        rn_warning!(nb, "row count mismatch"; anyhow::anyhow!("details"));

        assert_eq!(nb.len(), 2);
        assert_eq!(nb.count_kind(NotificationKind::Warning), 1);

        let msgs: Vec<_> = nb.messages().collect();
        assert_eq!(msgs[0], (NotificationKind::Note, "loaded 3 rows"));
        assert_eq!(msgs[1], (NotificationKind::Warning, "row count mismatch"));
    }

    #[test]
    fn drain_forwards_everything() {
        let mut first = BufferingNotificationBackend::new();
        rn_severe!(first, "one");
        rn_fatal!(first, "two");

        let mut second = BufferingNotificationBackend::new();
        first.drain(&mut second);
        assert_eq!(second.len(), 2);
        assert_eq!(second.count_kind(NotificationKind::Fatal), 1);
    }

    #[test]
    fn chatter_levels_are_ordered() {
        assert!(ChatterLevel::Minimal < ChatterLevel::Normal);
        assert!(ChatterLevel::Normal < ChatterLevel::Verbose);
    }
}
