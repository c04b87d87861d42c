//! Session behaviour against a virtual head

use std::time::Duration;

use radipower_head::{HeadError, LinkConfig, Session, Transport};
use radipower_protocol::{
    AveragingPolicy, BaudCode, Command, DeviceErrorKind, FilterCode, FilterSetting, ModelFamily,
    ProtocolError, VbwCode, VbwSetting,
};
use radipower_sim::{spawn_virtual_head, VirtualHead, VirtualHeadCommand, VirtualHeadConfig};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

fn link() -> LinkConfig {
    LinkConfig {
        read_timeout_ms: 500,
        ..Default::default()
    }
}

async fn connect(head: VirtualHead) -> (Session<DuplexStream>, mpsc::Sender<VirtualHeadCommand>) {
    let serial = head.serial_number().to_string();
    let handle = spawn_virtual_head(head);
    let transport = Transport::open("virtual", handle.stream, &link()).await;
    let session = Session::establish(transport, serial).await.unwrap();
    (session, handle.control)
}

fn rpr2006() -> VirtualHead {
    VirtualHead::new("0.2.1.7.62.1", "RPR2006C")
}

fn fixed_speed() -> VirtualHead {
    VirtualHead::new("1.99.234.24.23.0.0.212", "RPR1018A")
}

#[tokio::test]
async fn test_establish_reads_identity_and_mirror() {
    let (session, _control) = connect(rpr2006()).await;

    let identity = session.identity();
    assert_eq!(identity.serial_number, "0.2.1.7.62.1");
    assert_eq!(identity.model, "RPR2006C");
    assert_eq!(identity.family, ModelFamily::Rpr2006);
    assert_eq!(session.frequency_bounds(), (9_000, 6_000_000_000));

    let mirror = session.mirror();
    assert_eq!(mirror.filter, FilterSetting::Auto);
    assert_eq!(mirror.acq_speed_ksps, 20);
    assert_eq!(mirror.baud, BaudCode::B115200);
    assert_eq!(mirror.last_power, None);
}

#[tokio::test]
async fn test_read_power_and_auto_resolution() {
    let (mut session, control) = connect(rpr2006()).await;

    // AUTO has nothing to go on yet
    let err = session.resolve_sample_count().unwrap_err();
    assert!(matches!(
        err,
        HeadError::Protocol(ProtocolError::AutoNeedsReading)
    ));

    control
        .send(VirtualHeadCommand::SetPowerDbm(-25.31))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let reading = session.read_power().await.unwrap();
    assert_eq!(reading.value, -25.31);
    // -25.31 dBm falls in the code 4 band: 300 samples on an RPR2006
    assert_eq!(session.resolve_sample_count().unwrap(), 300);
}

#[tokio::test]
async fn test_set_filter_forgets_last_reading() {
    let (mut session, _control) = connect(rpr2006()).await;

    session.read_power().await.unwrap();
    assert!(session.mirror().last_power.is_some());

    session
        .set_filter(FilterSetting::Fixed(FilterCode::new(5).unwrap()))
        .await
        .unwrap();
    assert_eq!(session.mirror().last_power, None);
    assert_eq!(session.resolve_sample_count().unwrap(), 1000);

    session.set_filter(FilterSetting::Auto).await.unwrap();
    assert!(session.resolve_sample_count().is_err());
    assert_eq!(session.filter().await.unwrap(), FilterSetting::Auto);
}

#[tokio::test]
async fn test_apply_averaging_policies() {
    let (mut session, _control) = connect(rpr2006()).await;

    let code = session
        .apply_averaging(50, AveragingPolicy::NoSmear)
        .await
        .unwrap();
    assert_eq!(code.get(), 2);
    assert_eq!(
        session.filter().await.unwrap(),
        FilterSetting::Fixed(code)
    );

    let code = session
        .apply_averaging(50, AveragingPolicy::MinRmsNoise)
        .await
        .unwrap();
    assert_eq!(code.get(), 3);
}

#[tokio::test]
async fn test_averages_above_ceiling_sends_nothing() {
    let (mut session, _control) = connect(rpr2006()).await;
    let before = session.mirror().clone();

    let err = session
        .apply_averaging(6000, AveragingPolicy::Closest)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HeadError::Protocol(ProtocolError::AveragesAboveCeiling {
            requested: 6000,
            ceiling: 5000
        })
    ));
    assert_eq!(session.mirror(), &before);

    // The link is still in step
    assert_eq!(session.id_number().await.unwrap(), "0.2.1.7.62.1");
}

#[tokio::test]
async fn test_out_of_bounds_frequency_is_refused_as_argument_error() {
    let (mut session, _control) = connect(rpr2006()).await;

    let err = session.set_frequency(1_000).await.unwrap_err();
    assert_eq!(err.device_kind(), Some(DeviceErrorKind::ArgumentTooLow));
    assert!(err.to_string().contains("FREQUENCY 1000 Hz"));

    let err = session.set_frequency(7_000_000_000).await.unwrap_err();
    assert_eq!(err.device_kind(), Some(DeviceErrorKind::ArgumentTooHigh));

    // Neither was sent: the head still has its power-on frequency
    assert_eq!(session.frequency().await.unwrap(), 1_000_000_000);

    session.set_frequency(2_400_000_000).await.unwrap();
    assert_eq!(session.frequency().await.unwrap(), 2_400_000_000);
    assert_eq!(session.mirror().frequency_hz, Some(2_400_000_000));
}

#[tokio::test]
async fn test_acq_speed_by_family() {
    let (mut session, _control) = connect(rpr2006()).await;
    session.set_acq_speed(1000).await.unwrap();
    assert_eq!(session.acq_speed().await.unwrap(), 1000);
    assert!(session.set_acq_speed(500).await.is_err());

    // RPR1018 heads refuse ACQ_SPEED; the session never sends it
    let (mut session, _control) = connect(fixed_speed()).await;
    assert_eq!(session.family(), ModelFamily::Rpr1018);
    assert_eq!(session.acq_speed().await.unwrap(), 1000);
    session.set_acq_speed(1000).await.unwrap();
    let err = session.set_acq_speed(20).await.unwrap_err();
    assert!(matches!(
        err,
        HeadError::Protocol(ProtocolError::UnsupportedAcqSpeed { requested: 20, .. })
    ));
}

#[tokio::test]
async fn test_device_errors_surface_with_kind() {
    let head = VirtualHead::from_config(VirtualHeadConfig {
        frequency_hz: None,
        ..Default::default()
    });
    let (mut session, control) = connect(head).await;

    let err = session.read_power().await.unwrap_err();
    assert_eq!(err.device_kind(), Some(DeviceErrorKind::FrequencyNotSet));

    session.set_frequency(50_000_000).await.unwrap();
    control
        .send(VirtualHeadCommand::SetPowerDbm(35.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let err = session.read_power().await.unwrap_err();
    assert_eq!(err.device_kind(), Some(DeviceErrorKind::OverRange));
}

#[tokio::test]
async fn test_silent_head_times_out() {
    let (mut session, control) = connect(rpr2006()).await;
    control.send(VirtualHeadCommand::GoSilent(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = session.temperature().await.unwrap_err();
    assert!(err.is_timeout());

    // The session is spent: a reply could still turn up for the lost command
    let err = session.temperature().await.unwrap_err();
    assert!(err.is_desynced());
    let err = session.read_power().await.unwrap_err();
    assert!(err.is_desynced());
    assert_eq!(session.mirror().temperature_c, None);
}

#[tokio::test]
async fn test_video_bandwidth_follows_acq_speed() {
    let (mut session, _control) = connect(rpr2006()).await;
    assert_eq!(session.mirror().vbw, None);
    assert_eq!(session.video_bandwidth(), None);

    assert_eq!(session.vbw().await.unwrap(), VbwSetting::Auto);
    // AUTO at 20 kS/s
    assert_eq!(session.video_bandwidth(), Some(VbwCode::Khz200));
    session.set_acq_speed(1000).await.unwrap();
    assert_eq!(session.video_bandwidth(), Some(VbwCode::Mhz10));

    session
        .set_vbw(VbwSetting::Fixed(VbwCode::Khz1))
        .await
        .unwrap();
    assert_eq!(session.video_bandwidth().map(|c| c.bandwidth_hz()), Some(1_000));
    assert_eq!(
        session.vbw().await.unwrap(),
        VbwSetting::Fixed(VbwCode::Khz1)
    );
}

#[tokio::test]
async fn test_estimated_exchange_time() {
    let (mut session, _control) = connect(rpr2006()).await;

    // AUTO without a reading assumes the ceiling
    let worst = session.estimated_exchange_time();
    assert!(worst >= Duration::from_millis(50));

    session
        .set_filter(FilterSetting::Fixed(FilterCode::MIN))
        .await
        .unwrap();
    let best = session.estimated_exchange_time();
    assert!(best < worst);

    session.set_baud(BaudCode::B460800).await.unwrap();
    assert_eq!(session.baud().await.unwrap(), BaudCode::B460800);
    assert!(session.estimated_exchange_time() < best);
}

#[tokio::test]
async fn test_power_unit_and_versions() {
    let (mut session, _control) = connect(rpr2006()).await;
    assert_eq!(
        session.power_unit().await.unwrap(),
        radipower_protocol::PowerUnit::Dbm
    );
    assert!(session.identify().await.unwrap().contains("RPR2006C"));
    assert_eq!(session.hardware_version().await.unwrap(), "HW 3.1");
    assert_eq!(session.firmware_version().await.unwrap(), "SW 2.13");
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_raw_exchange_keeps_error_reply() {
    let handle = spawn_virtual_head(rpr2006());
    let mut transport = Transport::open("virtual", handle.stream, &link()).await;
    let reply = transport
        .exchange(&Command::SetAcqSpeed(500))
        .await
        .unwrap();
    assert_eq!(reply, "ERROR 50;[ACQ_SPEED 500]");
}
