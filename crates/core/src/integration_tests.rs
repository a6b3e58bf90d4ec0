//! Integration tests: exercise the full apply flow against a recording device.
//!
//! The recording transport stands in for the mouse. Every frame, payload,
//! read and wait is captured so the tests can check exact ordering across
//! the session, flash and runtime modules.

#[cfg(test)]
mod tests {
    use crate::config::TimingConfig;
    use crate::error::Error;
    use crate::flash::{self, DeviceState, FlashStep};
    use crate::macros::{ActionSpec, KeyState, MacroSpec};
    use crate::packet;
    use crate::profile::{ConfigurationProfile, PollingRate, ProfileSpec};
    use crate::sectors::{self, MacroSlot, Sector};
    use crate::session::{self, DeviceSession, SessionState};
    use crate::transport::{Event, RecordingTransport};
    use std::time::Duration;

    const HANDSHAKE_FRAMES: usize = 11;
    const DELAY: Event = Event::Pause(Duration::from_millis(10));

    fn scenario_a_spec() -> ProfileSpec {
        ProfileSpec {
            name: "scenario-a".into(),
            dpi_stages: vec![400, 800, 1200, 2400, 3200, 6200],
            colors: ["FF0055", "00FF00", "0000FF", "FFFF00", "FF8800", "00FFFF"]
                .map(String::from)
                .to_vec(),
            polling_rate: 1000,
            ..ProfileSpec::default()
        }
    }

    fn new_session(mock: RecordingTransport) -> DeviceSession<RecordingTransport> {
        DeviceSession::new(mock, TimingConfig::default())
    }

    fn padded(bytes: &[u8]) -> [u8; packet::CHUNK_LEN] {
        let mut chunk = [0u8; packet::CHUNK_LEN];
        chunk[..bytes.len()].copy_from_slice(bytes);
        chunk
    }

    /// Drop the inter-frame delays, keeping everything else in order.
    fn without_delays(events: Vec<Event>) -> Vec<Event> {
        events.into_iter().filter(|e| *e != DELAY).collect()
    }

    #[test]
    fn scenario_a_full_apply_order() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        let mut s = new_session(RecordingTransport::new());
        let report = flash::apply_profile(&mut s, &profile).unwrap();
        assert_eq!(s.state(), SessionState::Idle);

        let colors = padded(&packet::from_hex("FF005500FF000000FFFFFF00FF880000FFFF").unwrap());
        let dpi = padded(&packet::from_hex("04080C18203E7C78").unwrap());
        let matrix = profile.buttons();

        let mut expected = Vec::new();
        expected.push(Event::Feature(*session::stop_frame().unwrap().bytes()));
        expected.push(Event::Feature(*sectors::UNLOCK_PASSWORD.bytes()));
        expected.push(Event::Feature(*sectors::HANDSHAKE_START.bytes()));
        expected.push(Event::FeatureRead);
        expected.extend(sectors::TRIGGERS.iter().map(|f| Event::Feature(*f.bytes())));
        expected.extend(
            sectors::prep_sequence(PollingRate::Hz1000)
                .iter()
                .map(|f| Event::Feature(*f.bytes())),
        );
        expected.push(Event::Feature(*Sector::ColorPrimary.header().bytes()));
        expected.push(Event::Output(colors));
        expected.push(Event::Feature(*Sector::ColorSecondary.header().bytes()));
        expected.push(Event::Output(colors));
        expected.push(Event::Feature(*Sector::Dpi.header().bytes()));
        expected.push(Event::Output(dpi));
        expected.push(Event::Feature(*Sector::ButtonsLow.header().bytes()));
        expected.push(Event::Output(padded(&matrix.sector_bytes(0))));
        expected.push(Event::Feature(*Sector::ButtonsHigh.header().bytes()));
        expected.push(Event::Output(padded(&matrix.sector_bytes(1))));
        expected.push(Event::Feature(*Sector::Commit.header().bytes()));
        expected.push(Event::Output(padded(&[0xFF])));
        expected.push(Event::Pause(Duration::from_millis(1500)));
        expected.push(Event::Feature(
            packet::from_hex("01010000000000FD").unwrap().try_into().unwrap(),
        ));
        expected.push(Event::Feature(
            packet::from_hex("0E64640000000029").unwrap().try_into().unwrap(),
        ));
        expected.push(Event::Feature(
            packet::from_hex("04010C00000000EE").unwrap().try_into().unwrap(),
        ));

        assert_eq!(without_delays(s.transport().events()), expected);
        assert_eq!(report.frames_sent, HANDSHAKE_FRAMES + 5 + 6 + 3);
        assert_eq!(report.payloads_sent, 6);
        assert!(report.delay_clamps.is_empty());
    }

    #[test]
    fn scenario_a_every_send_is_followed_by_delay() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        let mut s = new_session(RecordingTransport::new());
        flash::apply_profile(&mut s, &profile).unwrap();

        let events = s.transport().events();
        for (i, e) in events.iter().enumerate() {
            if matches!(e, Event::Feature(_) | Event::Output(_)) {
                assert_eq!(events.get(i + 1), Some(&DELAY), "event {i}: {}", e.describe());
            }
        }
    }

    #[test]
    fn scenario_b_flash_without_unlock_writes_nothing() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        let mut s = new_session(RecordingTransport::new());
        let err = flash::write_sectors(&mut s, &profile).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed { .. }));
        assert!(s.transport().events().is_empty());
    }

    #[test]
    fn scenario_c_off_grid_dpi_rejected_before_io() {
        let spec = ProfileSpec {
            dpi_stages: vec![400, 450, 1200, 2400, 3200, 6200],
            ..scenario_a_spec()
        };
        let err = ConfigurationProfile::from_spec(&spec).unwrap_err();
        assert!(matches!(err, Error::InvalidProfile { field: "dpi_stages", .. }));
        assert_eq!(err.device_state(), DeviceState::Unchanged);
    }

    #[test]
    fn macro_sector_follows_buttons() {
        let spec = ProfileSpec {
            macros: vec![MacroSpec {
                slot: 1,
                repeat: 2,
                actions: vec![
                    ActionSpec {
                        state: KeyState::Press,
                        key: "A".into(),
                        delay_ms: 20,
                    },
                    ActionSpec {
                        state: KeyState::Release,
                        key: "A".into(),
                        delay_ms: 3000,
                    },
                ],
            }],
            ..scenario_a_spec()
        };
        let profile = ConfigurationProfile::from_spec(&spec).unwrap();
        let mut s = new_session(RecordingTransport::new());
        let report = flash::apply_profile(&mut s, &profile).unwrap();

        let events = without_delays(s.transport().events());
        let header = Event::Feature(*MacroSlot::Slot1.header().bytes());
        let at = events.iter().position(|e| *e == header).unwrap();

        // Right after the second button sector payload.
        assert_eq!(
            events[at - 2],
            Event::Feature(*Sector::ButtonsHigh.header().bytes())
        );
        let chunks: Vec<_> = events[at + 1..at + 5].to_vec();
        assert!(chunks.iter().all(|e| matches!(e, Event::Output(_))));
        match &chunks[0] {
            Event::Output(c) => assert_eq!(&c[..6], &[0x00, 0x02, 0x02, 0x04, 0xFF, 0x04]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[at + 5], Event::Feature(*Sector::Commit.header().bytes()));

        assert_eq!(report.payloads_sent, 6 + 4);
        assert_eq!(report.delay_clamps.len(), 1);
        assert_eq!(report.delay_clamps[0].applied_ms, 1270);
    }

    #[test]
    fn rate_selects_prep_sequence_and_mode() {
        let spec = ProfileSpec {
            polling_rate: 125,
            ..scenario_a_spec()
        };
        let profile = ConfigurationProfile::from_spec(&spec).unwrap();
        let mut s = new_session(RecordingTransport::new());
        flash::apply_profile(&mut s, &profile).unwrap();

        let frames = s.transport().feature_frames();
        let prep: Vec<_> = frames[HANDSHAKE_FRAMES..HANDSHAKE_FRAMES + 5].to_vec();
        let expected: Vec<_> = sectors::prep_sequence(PollingRate::Hz125)
            .iter()
            .map(|f| *f.bytes())
            .collect();
        assert_eq!(prep, expected);

        let runtime_rate = frames[frames.len() - 3];
        assert_eq!(&runtime_rate[..2], &[0x01, 0x08]);
    }

    #[test]
    fn failure_mid_flash_reports_inconsistent_device() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        // Output write 2 is the DPI payload.
        let mut s = new_session(RecordingTransport::new().fail_output_at(2));
        let err = flash::apply_profile(&mut s, &profile).unwrap_err();

        assert_eq!(err.device_state(), DeviceState::MayBeInconsistent);
        assert!(matches!(err, Error::Aborted { step: FlashStep::Dpi, .. }));
        // Nothing after the failure: no button sector, no commit.
        let frames = s.transport().feature_frames();
        assert_eq!(frames.last(), Some(Sector::Dpi.header().bytes()));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn failure_on_commit_header_reports_inconsistent_device() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        // 11 handshake + 5 prep + 5 sector headers, then the commit header.
        let mut s = new_session(RecordingTransport::new().fail_feature_at(21));
        let err = flash::apply_profile(&mut s, &profile).unwrap_err();
        assert!(matches!(
            err,
            Error::Aborted {
                step: FlashStep::Commit,
                device_state: DeviceState::MayBeInconsistent,
                ..
            }
        ));
        assert!(!s
            .transport()
            .events()
            .contains(&Event::Pause(Duration::from_millis(1500))));
    }

    #[test]
    fn runtime_failure_reports_stale_registers() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        // First runtime frame follows the commit header.
        let mut s = new_session(RecordingTransport::new().fail_feature_at(22));
        let err = flash::apply_profile(&mut s, &profile).unwrap_err();
        assert!(matches!(
            err,
            Error::Aborted {
                step: FlashStep::RuntimeApply,
                device_state: DeviceState::RuntimeStale,
                ..
            }
        ));
        assert!(s
            .transport()
            .events()
            .contains(&Event::Pause(Duration::from_millis(1500))));
    }

    #[test]
    fn handshake_timeout_aborts_before_any_sector() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        let mut s = new_session(RecordingTransport::new().without_confirmation());
        let err = flash::apply_profile(&mut s, &profile).unwrap_err();
        assert_eq!(err.device_state(), DeviceState::Unchanged);
        assert!(s.transport().output_chunks().is_empty());
        assert_eq!(s.transport().feature_frames().len(), 3);
    }

    #[test]
    fn session_is_reusable_after_apply() {
        let profile = ConfigurationProfile::from_spec(&scenario_a_spec()).unwrap();
        let mut s = new_session(RecordingTransport::new());
        flash::apply_profile(&mut s, &profile).unwrap();
        let first = s.transport().events().len();
        flash::apply_profile(&mut s, &profile).unwrap();
        assert_eq!(s.transport().events().len(), first * 2);
    }
}
