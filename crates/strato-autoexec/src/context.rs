//! The startup-owned boot-script context.
//!
//! One [`Autoexec`] instance is constructed by the emulator's startup
//! orchestrator and owns everything the subsystem needs: the composer, the
//! banner texts, the rendered script, and the publish cache. Calls are
//! expected to be serialized by the owner; the type takes no locks itself.

use crate::publish::{BootScriptSink, CodePageTranscoder, PublishCache};
use crate::script::{Banners, ScriptComposer, VariableError, VariablePolicy};
use crate::startup::{self, CommandLine, DriveCatalog, HostPaths, StartupOptions};

/// Live command-interpreter environment; variables set after the interpreter
/// has started are pushed into it directly, in addition to being recorded for
/// the next script regeneration.
pub trait ShellEnvironment {
    fn set_env(&mut self, name: &str, value: &str);
}

#[derive(Debug, Default)]
pub struct Autoexec {
    composer: ScriptComposer,
    banners: Banners,
    /// Rendered UTF-8 script; republishing on a code-page change reuses this
    /// text instead of re-rendering.
    composed: Option<String>,
    cache: PublishCache,
    shutting_down: bool,
}

impl Autoexec {
    pub fn new(banners: Banners, policy: VariablePolicy) -> Self {
        Self {
            composer: ScriptComposer::new(policy),
            banners,
            ..Self::default()
        }
    }

    pub fn composer(&self) -> &ScriptComposer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut ScriptComposer {
        &mut self.composer
    }

    /// The most recently rendered script text, if any.
    pub fn composed_script(&self) -> Option<&str> {
        self.composed.as_deref()
    }

    /// Runs the one-time composition sequence (auto-mount commands, command
    /// line, configuration section) and publishes the first script image for
    /// the guest's current code page.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        options: &StartupOptions,
        cmdline: &mut dyn CommandLine,
        drives: &dyn DriveCatalog,
        host_paths: &dyn HostPaths,
        code_page: u16,
        transcoder: &dyn CodePageTranscoder,
        sink: &mut dyn BootScriptSink,
    ) {
        startup::populate(&mut self.composer, options, cmdline, drives, host_paths);
        self.register_or_refresh(code_page, transcoder, sink);
    }

    /// Records a variable for the next script regeneration and, when an
    /// interpreter is already running, pushes it into its live environment.
    /// The live update happens even for an empty value (which removes the
    /// stored entry).
    pub fn set_variable(
        &mut self,
        name: &str,
        value: &str,
        shell: Option<&mut dyn ShellEnvironment>,
    ) -> Result<(), VariableError> {
        self.composer.set_variable(name, value)?;
        if let Some(shell) = shell {
            shell.set_env(&name.to_ascii_uppercase(), value);
        }
        Ok(())
    }

    /// Renders and republishes unconditionally. Call after anything that
    /// changes what the script should contain (e.g. the variable mapping).
    pub fn register_or_refresh(
        &mut self,
        code_page: u16,
        transcoder: &dyn CodePageTranscoder,
        sink: &mut dyn BootScriptSink,
    ) {
        let composed = self.composer.render(&self.banners);
        self.cache.publish(&composed, code_page, transcoder, sink);
        self.composed = Some(composed);
    }

    /// Reacts to the guest switching its active code page: republishes the
    /// already-rendered script in the new encoding, unless nothing was ever
    /// published, the code page is unchanged, or shutdown has begun.
    pub fn notify_code_page_changed(
        &mut self,
        active_code_page: u16,
        transcoder: &dyn CodePageTranscoder,
        sink: &mut dyn BootScriptSink,
    ) {
        if self.shutting_down {
            return;
        }
        let Some(composed) = self.composed.as_deref() else {
            return;
        };
        self.cache
            .handle_code_page_change(composed, active_code_page, transcoder, sink);
    }

    /// After this, code-page notifications become no-ops.
    pub fn begin_shutdown(&mut self) {
        self.shutting_down = true;
    }
}
