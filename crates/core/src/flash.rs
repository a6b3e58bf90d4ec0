//! Sector flashing, commit and full profile application.
//!
//! Write order is fixed and is part of correctness:
//!
//! 1. polling-rate preparation frames
//! 2. colors, primary then secondary copy
//! 3. DPI stages + calibration suffix
//! 4. buttons 1-8, then 9-16
//! 5. macros (one header, four 32-byte chunks each)
//! 6. commit, then the post-commit wait
//!
//! Nothing is retried. The first failure stops the run and is reported as
//! [`Error::Aborted`] with the step and what the caller may assume about the
//! device.

use crate::error::{Error, Result};
use crate::macros::DelayClamp;
use crate::profile::ConfigurationProfile;
use crate::runtime;
use crate::sectors::{self, Sector};
use crate::session::{stop_frame, DeviceSession, SessionState};
use crate::transport::DeviceTransport;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Stage of an apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStep {
    Unlock,
    PrepareFlash,
    Colors,
    Dpi,
    Buttons,
    Macros,
    Commit,
    RuntimeApply,
}

impl fmt::Display for FlashStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unlock => "unlock",
            Self::PrepareFlash => "flash preparation",
            Self::Colors => "color sectors",
            Self::Dpi => "dpi sector",
            Self::Buttons => "button sectors",
            Self::Macros => "macro sectors",
            Self::Commit => "commit",
            Self::RuntimeApply => "runtime apply",
        };
        f.write_str(name)
    }
}

/// What a failed run leaves behind on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Nothing was written to flash.
    Unchanged,
    /// Some sectors were written but not committed. Re-run the whole profile.
    MayBeInconsistent,
    /// Flash is committed; the volatile registers may still hold old values.
    RuntimeStale,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::MayBeInconsistent => f.write_str("may be inconsistent"),
            Self::RuntimeStale => f.write_str("persisted, runtime values stale"),
        }
    }
}

/// Summary of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub frames_sent: usize,
    pub payloads_sent: usize,
    pub delay_clamps: Vec<DelayClamp>,
    pub elapsed: Duration,
}

fn run_step<T, R>(
    session: &mut DeviceSession<T>,
    step: FlashStep,
    op: impl FnOnce(&mut DeviceSession<T>) -> Result<R>,
) -> Result<R>
where
    T: DeviceTransport,
{
    debug!(%step, "Flash step");
    op(session).map_err(|source| {
        let device_state = if session.flash_writes() == 0 {
            DeviceState::Unchanged
        } else {
            DeviceState::MayBeInconsistent
        };
        error!(%step, %device_state, error = %source, "Flash step failed");
        session.reset();
        Error::Aborted {
            step,
            device_state,
            source: Box::new(source),
        }
    })
}

fn write_sector<T: DeviceTransport>(
    session: &mut DeviceSession<T>,
    sector: Sector,
    data: &[u8],
) -> Result<()> {
    debug!(sector = sector.name(), len = data.len(), "Sector write");
    session.send_command(&sector.header())?;
    session.send_payload(data)
}

/// Write every sector of `profile`. The session must be `Unlocked`.
///
/// Returns the delay clamps reported while compiling macros.
pub fn write_sectors<T: DeviceTransport>(
    session: &mut DeviceSession<T>,
    profile: &ConfigurationProfile,
) -> Result<Vec<DelayClamp>> {
    if session.state() != SessionState::Unlocked {
        return Err(Error::HandshakeFailed {
            state: session.state(),
            reason: "sector writes require an unlocked session".to_string(),
        });
    }

    // Compile up front so a macro error cannot stop the run halfway.
    let compiled = profile
        .macros()
        .iter()
        .map(|m| m.compile().map(|c| (m.slot(), c)))
        .collect::<Result<Vec<_>>>()?;

    run_step(session, FlashStep::PrepareFlash, |s| {
        for frame in profile.polling_rate().prep_sequence() {
            s.send_command(frame)?;
        }
        Ok(())
    })?;

    run_step(session, FlashStep::Colors, |s| {
        let colors = profile.color_bytes();
        write_sector(s, Sector::ColorPrimary, &colors)?;
        write_sector(s, Sector::ColorSecondary, &colors)
    })?;

    run_step(session, FlashStep::Dpi, |s| {
        let mut dpi = profile.dpi_bytes().to_vec();
        dpi.extend_from_slice(&sectors::DPI_SUFFIX);
        write_sector(s, Sector::Dpi, &dpi)
    })?;

    run_step(session, FlashStep::Buttons, |s| {
        let buttons = profile.buttons();
        write_sector(s, Sector::ButtonsLow, &buttons.sector_bytes(0))?;
        write_sector(s, Sector::ButtonsHigh, &buttons.sector_bytes(1))
    })?;

    run_step(session, FlashStep::Macros, |s| {
        for (slot, macro_) in &compiled {
            debug!(slot = slot.number(), repeat = macro_.blob.repeat(), "Macro write");
            s.send_command(&slot.header())?;
            for chunk in macro_.blob.chunks() {
                s.send_payload(chunk)?;
            }
        }
        Ok(())
    })?;
    let clamps = compiled.into_iter().flat_map(|(_, c)| c.clamped).collect();

    info!(
        writes = session.flash_writes(),
        macros = profile.macros().len(),
        "Sectors written"
    );
    Ok(clamps)
}

/// Seal flash and wait for the device to reload it.
pub fn commit<T: DeviceTransport>(session: &mut DeviceSession<T>) -> Result<()> {
    if session.state() != SessionState::Unlocked {
        return Err(Error::HandshakeFailed {
            state: session.state(),
            reason: "commit requires an unlocked session".to_string(),
        });
    }

    run_step(session, FlashStep::Commit, |s| {
        write_sector(s, Sector::Commit, &sectors::COMMIT_FLUSH)?;
        if s.timing().stop_after_commit {
            s.send_command(&stop_frame()?)?;
        }
        Ok(())
    })?;

    let wait = session.timing().post_commit_wait;
    info!(wait_ms = wait.as_millis() as u64, "Committed, waiting for flash reload");
    session.transport().pause(wait);
    session.set_state(SessionState::Committed);
    Ok(())
}

/// Apply a validated profile end to end: unlock, write, commit, runtime.
///
/// The profile is validated by construction, so every error here comes from
/// the device or the session state.
pub fn apply_profile<T: DeviceTransport>(
    session: &mut DeviceSession<T>,
    profile: &ConfigurationProfile,
) -> Result<ApplyReport> {
    let started = Instant::now();
    let frames_before = session.frames_sent();
    let payloads_before = session.payloads_sent();
    info!(profile = profile.name(), rate = %profile.polling_rate(), "Applying profile");

    session.unlock().map_err(|source| Error::Aborted {
        step: FlashStep::Unlock,
        device_state: DeviceState::Unchanged,
        source: Box::new(source),
    })?;

    let delay_clamps = write_sectors(session, profile)?;
    commit(session)?;
    runtime::apply_runtime(session, profile)?;

    let report = ApplyReport {
        frames_sent: session.frames_sent() - frames_before,
        payloads_sent: session.payloads_sent() - payloads_before,
        delay_clamps,
        elapsed: started.elapsed(),
    };
    info!(
        frames = report.frames_sent,
        payloads = report.payloads_sent,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Profile applied"
    );
    Ok(report)
}
