//! TC apply/process pipeline tests against NIST-style vectors.
//!
//! The receiving context is provisioned the way a mission would: managed
//! channels, an operational SA, a key loaded ACTIVE. Inbound frames are
//! assembled byte-by-byte so every rejection path sees real wire data.

use sdls_core::{
    AuthenticationSuite, ChannelBinding, Config, Counter, CryptoContext, EncryptionSuite,
    EventType, KeyState, ManagedParameters, ProcessingError, SaState, SecurityAssociation,
};
use sdls_crypto::{CryptoProvider, RustCryptoProvider};
use sdls_proto::{Gvcid, crc};

const KEY_HEX: &str = "ef9f9284cf599eac3b119905a7d18851e7e374cf63aea04358586b0f757670f8";
const LAST_IV_HEX: &str = "b6ac8e4963f49207ffd6374b";

fn key_bytes() -> [u8; 32] {
    let mut key = [0u8; 32];
    key.copy_from_slice(&hex::decode(KEY_HEX).unwrap());
    key
}

fn managed(config: &mut Config, vcid: u8) {
    config.add_managed_parameters(ManagedParameters {
        tfvn: 0,
        scid: 0x003,
        vcid,
        has_fecf: true,
        has_segment_header: true,
    });
}

fn gcm_sa(spi: u16, last_iv: &str, arsnw: u16) -> SecurityAssociation {
    let mut sa = SecurityAssociation::new(spi);
    sa.state = SaState::Operational;
    sa.est = true;
    sa.ast = true;
    sa.ecs = EncryptionSuite::Aes256Gcm;
    sa.ekid = 130;
    sa.iv = Counter::from_slice(&hex::decode(last_iv).unwrap());
    sa.arsnw = arsnw;
    sa.stmacf_len = 16;
    for vcid in 0..2 {
        sa.channels.push(ChannelBinding {
            gvcid: Gvcid { tfvn: 0, scid: 0x003, vcid },
            mapid: 0,
        });
    }
    sa
}

fn receiver() -> CryptoContext {
    let mut config = Config::new();
    managed(&mut config, 0);
    managed(&mut config, 1);
    let mut ctx = CryptoContext::new(config);
    ctx.key_ring_mut().load(130, key_bytes(), KeyState::Active).unwrap();
    ctx.sa_store_mut().insert(gcm_sa(9, LAST_IV_HEX, 5)).unwrap();
    ctx
}

/// Assemble a protected frame for SA 9 the way a peer engine would:
/// primary header, segment byte, SPI, IV, AEAD payload, tag, FECF.
fn protected_frame(iv_hex: &str, payload: &[u8]) -> Vec<u8> {
    let iv = hex::decode(iv_hex).unwrap();
    let total = 5 + 1 + 2 + iv.len() + payload.len() + 16 + 2;

    let mut frame = Vec::with_capacity(total);
    let frame_len = (total - 1) as u16;
    frame.push(0x20);
    frame.push(0x03);
    frame.push(((frame_len & 0x300) >> 8) as u8);
    frame.push((frame_len & 0xFF) as u8);
    frame.push(0x00);
    frame.push(0xFF); // segment header
    frame.extend_from_slice(&9u16.to_be_bytes());
    frame.extend_from_slice(&iv);

    // Default ABM is all zeros, so the AAD is the zeroed header image.
    let aad = vec![0u8; frame.len()];
    let sealed = RustCryptoProvider::new().aead_encrypt(&key_bytes(), &iv, &aad, payload).unwrap();
    frame.extend_from_slice(&sealed.ciphertext);
    frame.extend_from_slice(&sealed.tag);

    let fecf = crc::fecf(&frame);
    frame.extend_from_slice(&fecf.to_be_bytes());
    frame
}

fn stored_iv(ctx: &CryptoContext) -> Vec<u8> {
    ctx.sa_store().by_spi(9).unwrap().iv.as_bytes().to_vec()
}

#[test]
fn iv_window_walk() {
    let mut ctx = receiver();

    // Replaying the last accepted IV falls outside the window
    let replay = protected_frame(LAST_IV_HEX, b"");
    let status = ctx.process_security(&replay);
    assert_eq!(status.unwrap_err(), ProcessingError::IvOutsideWindow { spi: 9 });
    assert_eq!(stored_iv(&ctx), hex::decode(LAST_IV_HEX).unwrap());

    // Seventeen past the last accepted is outside a window of five
    let outside = protected_frame("b6ac8e4963f49207ffd6375c", b"");
    let status = ctx.process_security(&outside);
    assert_eq!(status.unwrap_err(), ProcessingError::IvOutsideWindow { spi: 9 });
    assert_eq!(stored_iv(&ctx), hex::decode(LAST_IV_HEX).unwrap());

    // The exact next IV is accepted and committed
    let good = protected_frame("b6ac8e4963f49207ffd6374c", b"");
    ctx.process_security(&good).unwrap();
    assert_eq!(stored_iv(&ctx), hex::decode("b6ac8e4963f49207ffd6374c").unwrap());

    // A gap within the window is accepted; intermediate values are
    // skipped, not iterated
    let gap = protected_frame("b6ac8e4963f49207ffd6374f", b"");
    ctx.process_security(&gap).unwrap();
    assert_eq!(stored_iv(&ctx), hex::decode("b6ac8e4963f49207ffd6374f").unwrap());
}

#[test]
fn window_boundary_is_last_plus_arsnw() {
    // ARSNW = 5: last+5 accepted, last+6 rejected
    let mut ctx = receiver();
    let at_edge = protected_frame("b6ac8e4963f49207ffd63750", b""); // last + 5
    ctx.process_security(&at_edge).unwrap();

    let mut ctx = receiver();
    let past_edge = protected_frame("b6ac8e4963f49207ffd63751", b""); // last + 6
    let status = ctx.process_security(&past_edge);
    assert_eq!(status.unwrap_err(), ProcessingError::IvOutsideWindow { spi: 9 });
}

#[test]
fn rejections_update_fsr_and_log() {
    let mut ctx = receiver();
    let replay = protected_frame(LAST_IV_HEX, b"");
    ctx.process_security(&replay).unwrap_err();

    let fsr = ctx.reporting().fsr;
    assert!(fsr.alarm);
    assert!(fsr.bad_sn);
    assert_eq!(fsr.last_spi, 9);

    let events: Vec<EventType> =
        ctx.event_log().entries().iter().map(|e| e.event).collect();
    assert!(events.contains(&EventType::IvWindowError));
}

#[test]
fn arsn_cmac_window_walk() {
    let mut config = Config::new();
    managed(&mut config, 0);
    let mut ctx = CryptoContext::new(config);
    ctx.key_ring_mut().load(131, key_bytes(), KeyState::Active).unwrap();

    let mut sa = SecurityAssociation::new(9);
    sa.state = SaState::Operational;
    sa.est = false;
    sa.ast = true;
    sa.acs = AuthenticationSuite::Aes256Cmac;
    sa.akid = 131;
    sa.arsn = Counter::from_slice(&hex::decode("0123").unwrap());
    sa.arsnw = 5;
    sa.stmacf_len = 16;
    sa.channels.push(ChannelBinding {
        gvcid: Gvcid { tfvn: 0, scid: 0x003, vcid: 0 },
        mapid: 0,
    });
    ctx.sa_store_mut().insert(sa).unwrap();

    let frame_for = |arsn_hex: &str| -> Vec<u8> {
        let arsn = hex::decode(arsn_hex).unwrap();
        let total = 5 + 1 + 2 + arsn.len() + 16 + 2;
        let mut frame = Vec::with_capacity(total);
        let frame_len = (total - 1) as u16;
        frame.push(0x20);
        frame.push(0x03);
        frame.push(((frame_len & 0x300) >> 8) as u8);
        frame.push((frame_len & 0xFF) as u8);
        frame.push(0x00);
        frame.push(0xFF);
        frame.extend_from_slice(&9u16.to_be_bytes());
        frame.extend_from_slice(&arsn);

        let data = vec![0u8; frame.len()]; // zero ABM, empty payload
        let tag = RustCryptoProvider::new().mac_tag(&key_bytes(), &data).unwrap();
        frame.extend_from_slice(&tag);
        let fecf = crc::fecf(&frame);
        frame.extend_from_slice(&fecf.to_be_bytes());
        frame
    };

    let status = ctx.process_security(&frame_for("0123"));
    assert_eq!(status.unwrap_err(), ProcessingError::ArsnOutsideWindow { spi: 9 });

    let status = ctx.process_security(&frame_for("0444"));
    assert_eq!(status.unwrap_err(), ProcessingError::ArsnOutsideWindow { spi: 9 });

    ctx.process_security(&frame_for("0124")).unwrap();
    ctx.process_security(&frame_for("0129")).unwrap();

    let sa = ctx.sa_store().by_spi(9).unwrap();
    assert_eq!(sa.arsn.as_bytes(), hex::decode("0129").unwrap());
}

#[test]
fn apply_then_process_round_trips() {
    let mut sender = receiver();
    let mut rx = receiver();

    let payload = b"no crewed vehicle shall rely on obscurity";
    let mut clear = vec![0x20, 0x03, 0x00, 0x00, 0x00, 0xFF];
    clear.extend_from_slice(payload);

    let protected = sender.apply_security(&clear).unwrap();
    let processed = rx.process_security(&protected).unwrap();

    assert_eq!(processed.pdu.as_ref(), payload);
    assert_eq!(processed.spi, 9);
    // Sender's post-apply IV equals receiver's post-process IV
    assert_eq!(stored_iv(&sender), stored_iv(&rx));
}

#[test]
fn replayed_frame_is_rejected_without_sa_mutation() {
    let mut sender = receiver();
    let mut rx = receiver();

    let mut clear = vec![0x20, 0x03, 0x00, 0x00, 0x00, 0xFF];
    clear.extend_from_slice(b"once only");
    let protected = sender.apply_security(&clear).unwrap();

    rx.process_security(&protected).unwrap();
    let iv_after_first = stored_iv(&rx);

    let status = rx.process_security(&protected);
    assert_eq!(status.unwrap_err(), ProcessingError::IvOutsideWindow { spi: 9 });
    assert_eq!(stored_iv(&rx), iv_after_first);
}

#[test]
fn apply_counters_strictly_increase() {
    let mut sender = receiver();
    let clear = [0x20, 0x03, 0x00, 0x00, 0x00, 0xFF, 0x42];

    let mut previous = Counter::from_slice(&stored_iv(&sender));
    for _ in 0..4 {
        sender.apply_security(&clear).unwrap();
        let current = Counter::from_slice(&stored_iv(&sender));
        assert!(current > previous);
        previous = current;
    }
}

#[test]
fn bit_flips_are_caught_by_fecf_or_mac() {
    let mut sender = receiver();
    let mut clear = vec![0x20, 0x03, 0x00, 0x00, 0x00, 0xFF];
    clear.extend_from_slice(b"integrity matters");
    let protected = sender.apply_security(&clear).unwrap().to_vec();

    // A flip anywhere under the FECF fails the FECF check: the frame
    // sequence number, a payload byte, a MAC byte
    for position in [4usize, 22, protected.len() - 4] {
        let mut tampered = protected.clone();
        tampered[position] ^= 0x04;
        let mut rx = receiver();
        let status = rx.process_security(&tampered).unwrap_err();
        assert!(
            matches!(status, ProcessingError::FecfInvalid { .. }),
            "flip at {position} produced {status:?}"
        );
    }

    // With the FECF repaired, a payload flip still dies on the tag, and
    // the SA counter is untouched
    let mut tampered = protected.clone();
    let payload_byte = 22;
    tampered[payload_byte] ^= 0x01;
    let fecf_at = tampered.len() - 2;
    let fixed = crc::fecf(&tampered[..fecf_at]);
    tampered[fecf_at..].copy_from_slice(&fixed.to_be_bytes());

    let mut rx = receiver();
    let before = stored_iv(&rx);
    let status = rx.process_security(&tampered);
    assert_eq!(status.unwrap_err(), ProcessingError::MacValidation { spi: 9 });
    assert_eq!(stored_iv(&rx), before);
    assert!(rx.reporting().fsr.bad_mac);
}

#[test]
fn reserved_and_unknown_spis_are_rejected() {
    for spi in [0x0000u16, 0xFFFF, 0x0050] {
        let mut ctx = receiver();
        let mut frame = protected_frame("b6ac8e4963f49207ffd6374c", b"");
        frame[6..8].copy_from_slice(&spi.to_be_bytes());
        let fecf_at = frame.len() - 2;
        let fixed = crc::fecf(&frame[..fecf_at]);
        frame[fecf_at..].copy_from_slice(&fixed.to_be_bytes());

        let status = ctx.process_security(&frame);
        assert_eq!(status.unwrap_err(), ProcessingError::SpiInvalid { spi });
        assert!(ctx.reporting().fsr.invalid_spi);
    }
}

#[test]
fn non_operational_sa_is_rejected() {
    let mut ctx = receiver();
    ctx.sa_store_mut().by_spi_mut(9).unwrap().state = SaState::Keyed;

    let frame = protected_frame("b6ac8e4963f49207ffd6374c", b"");
    let status = ctx.process_security(&frame);
    assert_eq!(
        status.unwrap_err(),
        ProcessingError::SaStateInvalid { spi: 9, state: SaState::Keyed }
    );
}

#[test]
fn ignore_sa_state_accepts_keyed_sa() {
    let mut config = Config::new();
    managed(&mut config, 0);
    managed(&mut config, 1);
    config.ignore_sa_state = true;
    let mut ctx = CryptoContext::new(config);
    ctx.key_ring_mut().load(130, key_bytes(), KeyState::Active).unwrap();
    let mut sa = gcm_sa(9, LAST_IV_HEX, 5);
    sa.state = SaState::Keyed;
    ctx.sa_store_mut().insert(sa).unwrap();

    let frame = protected_frame("b6ac8e4963f49207ffd6374c", b"");
    ctx.process_security(&frame).unwrap();
}

#[test]
fn declared_length_beyond_buffer_is_rejected() {
    let mut ctx = receiver();
    let mut frame = protected_frame("b6ac8e4963f49207ffd6374c", b"");
    frame.truncate(frame.len() - 10);

    let status = ctx.process_security(&frame);
    assert!(matches!(status.unwrap_err(), ProcessingError::Frame(_)));
}

#[test]
fn unknown_scid_is_rejected() {
    let mut ctx = receiver();
    let mut frame = protected_frame("b6ac8e4963f49207ffd6374c", b"");
    frame[1] = 0x2A; // scid 0x02A is not managed

    let status = ctx.process_security(&frame);
    assert_eq!(status.unwrap_err(), ProcessingError::ScidMismatch { scid: 0x2A });
}

#[test]
fn apply_without_operational_sa_fails() {
    let mut config = Config::new();
    managed(&mut config, 0);
    let mut ctx = CryptoContext::new(config);

    let clear = [0x20, 0x03, 0x00, 0x00, 0x00, 0xFF, 0x42];
    let status = ctx.apply_security(&clear);
    assert!(matches!(status.unwrap_err(), ProcessingError::NoApplicableSa { vcid: 0, .. }));
}

#[test]
fn apply_requires_an_active_key() {
    let mut ctx = receiver();
    ctx.key_ring_mut().set_state(130, KeyState::Deactivated).unwrap();

    let clear = [0x20, 0x03, 0x00, 0x00, 0x00, 0xFF, 0x42];
    let status = ctx.apply_security(&clear);
    assert_eq!(
        status.unwrap_err(),
        ProcessingError::KeyStateInvalid { kid: 130, state: KeyState::Deactivated }
    );
}

#[test]
fn apply_rejects_oversized_frames() {
    let mut ctx = receiver();
    let mut clear = vec![0x20, 0x03, 0x00, 0x00, 0x00, 0xFF];
    clear.extend_from_slice(&[0u8; 1010]);

    let status = ctx.apply_security(&clear);
    assert!(matches!(status.unwrap_err(), ProcessingError::FrameSizeOverflow { .. }));
}

#[test]
fn clear_sa_passes_payload_through_with_fecf() {
    let mut config = Config::new();
    managed(&mut config, 0);
    let mut ctx = CryptoContext::new(config);

    let mut sa = SecurityAssociation::new(3);
    sa.state = SaState::Operational;
    sa.channels.push(ChannelBinding {
        gvcid: Gvcid { tfvn: 0, scid: 0x003, vcid: 0 },
        mapid: 0,
    });
    ctx.sa_store_mut().insert(sa).unwrap();

    let payload = b"in the clear";
    let mut clear = vec![0x20, 0x03, 0x00, 0x00, 0x00, 0xFF];
    clear.extend_from_slice(payload);

    let protected = ctx.apply_security(&clear).unwrap();
    let processed = ctx.process_security(&protected).unwrap();
    assert_eq!(processed.pdu.as_ref(), payload);
}
