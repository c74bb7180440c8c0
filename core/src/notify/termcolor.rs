// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A notification backend that sends colorized output to the terminal.

Notes go to standard output; everything else goes to standard error. Failures
to write to the terminal are ignored, since there is nowhere left to report
them.

*/

use anyhow::Error;
use std::fmt::Arguments;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::{ChatterLevel, NotificationBackend, NotificationKind};

/// A notification backend that writes colorized output to the terminal.
pub struct TermcolorNotificationBackend {
    chatter: ChatterLevel,
    stdout: StandardStream,
    stderr: StandardStream,
    note_spec: ColorSpec,
    warning_spec: ColorSpec,
    severe_spec: ColorSpec,
}

impl TermcolorNotificationBackend {
    /// Create a new TermcolorNotificationBackend.
    pub fn new(chatter: ChatterLevel) -> TermcolorNotificationBackend {
        let mut note_spec = ColorSpec::new();
        note_spec.set_fg(Some(Color::Green)).set_bold(true);

        let mut warning_spec = ColorSpec::new();
        warning_spec.set_fg(Some(Color::Yellow)).set_bold(true);

        let mut severe_spec = ColorSpec::new();
        severe_spec.set_fg(Some(Color::Red)).set_bold(true);

        TermcolorNotificationBackend {
            chatter,
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
            note_spec,
            warning_spec,
            severe_spec,
        }
    }

    fn emit(&mut self, kind: NotificationKind, prefix: &str, args: Arguments) {
        if kind == NotificationKind::Note && self.chatter <= ChatterLevel::Minimal {
            return;
        }

        let (spec, stream) = match kind {
            NotificationKind::Note => (&self.note_spec, &mut self.stdout),
            NotificationKind::Warning => (&self.warning_spec, &mut self.stderr),
            NotificationKind::Severe | NotificationKind::Fatal => {
                (&self.severe_spec, &mut self.stderr)
            }
        };

        let _ = stream.set_color(spec);
        let _ = write!(stream, "{prefix}");
        let _ = stream.reset();
        let _ = writeln!(stream, " {args}");
    }

    fn emit_causes(&mut self, kind: NotificationKind, err: &Error) {
        for cause in err.chain() {
            self.emit(kind, "caused by:", format_args!("{cause}"));
        }

        if self.chatter >= ChatterLevel::Verbose {
            let backtrace = err.backtrace();
            self.emit(kind, "debugging:", format_args!("backtrace follows:"));
            let _ = writeln!(self.stderr, "{backtrace:?}");
        }
    }

    /// Print the information contained in an Error object.
    ///
    /// This prints the error and the chain of errors that caused it. The
    /// backtrace is only printed at the verbose chatter level.
    pub fn bare_error<E: Into<Error>>(&mut self, err: E) {
        let err = err.into();
        self.emit(NotificationKind::Severe, "error:", format_args!("{err}"));

        for cause in err.chain().skip(1) {
            self.emit(
                NotificationKind::Severe,
                "caused by:",
                format_args!("{cause}"),
            );
        }

        if self.chatter >= ChatterLevel::Verbose {
            let backtrace = err.backtrace();
            let _ = writeln!(self.stderr, "{backtrace:?}");
        }
    }
}

impl NotificationBackend for TermcolorNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        let prefix = match kind {
            NotificationKind::Note => "note:",
            NotificationKind::Warning => "warning:",
            NotificationKind::Severe => "severe:",
            NotificationKind::Fatal => "fatal:",
        };

        self.emit(kind, prefix, args);

        if let Some(e) = err {
            self.emit_causes(kind, &e);
        }
    }
}
