use vcuemu::modules::shifter::{
    encode_gear_status, RollingCounter, GEAR_STATUS_ID, LEVER_STATUS_ID, SHUTDOWN_TICKS,
};
use vcuemu::modules::{GearShifter, GearState};
use vcuemu::*;

fn lever_frame(code: u8, sequence: u8) -> Frame {
    Frame::new(LEVER_STATUS_ID, &[0, 0, 0, code << 4, 0, 0, 0, sequence]).unwrap()
}

fn decode(shifter: &mut GearShifter, bus: &mut FrameRecorder, params: &mut ParamTable, frame: &Frame) {
    let mut ctx = ModuleContext::new(bus, params);
    shifter.decode(frame, &mut ctx);
}

/// Two 10 ms ticks, i.e. exactly one status frame while transmitting.
fn transmit_cycle(shifter: &mut GearShifter, bus: &mut FrameRecorder, params: &mut ParamTable) {
    let mut ctx = ModuleContext::new(bus, params);
    shifter.task_10ms(&mut ctx);
    shifter.task_10ms(&mut ctx);
}

fn tick_100ms(shifter: &mut GearShifter, bus: &mut FrameRecorder, params: &mut ParamTable) {
    let mut ctx = ModuleContext::new(bus, params);
    shifter.task_100ms(&mut ctx);
}

fn setup(mode: OpMode) -> (GearShifter, FrameRecorder, ParamTable) {
    let mut params = ParamTable::new();
    params.set_op_mode(mode);
    (GearShifter::new(), FrameRecorder::new(), params)
}

#[cfg(test)]
mod encoding_tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let shifter = GearShifter::new();
        assert_eq!(shifter.get_gear(), GearState::Park);
        assert_eq!(shifter.requested(), GearState::Park);
        assert_eq!(shifter.rolling_counter().value(), 0);
        assert!(shifter.is_transmitting());
    }

    #[test]
    fn test_bind_subscribes_lever_frame() {
        let mut shifter = GearShifter::new();
        let mut bus = FrameRecorder::new();
        shifter.bind(&mut bus).unwrap();
        assert!(bus.is_subscribed(LEVER_STATUS_ID));
    }

    #[test]
    fn test_drive_frame_in_run_mode() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(3, 0x05));
        assert_eq!(shifter.requested(), GearState::Drive);
        assert_eq!(shifter.get_gear(), GearState::Park);

        transmit_cycle(&mut shifter, &mut bus, &mut params);

        let sent: Vec<_> = bus.sent_with_id(GEAR_STATUS_ID).collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].payload(),
            &[0x7C, 0x24, 0x00, 0x06, 0xFB, 0xFF, 0x04, 0x00]
        );
        assert_eq!(shifter.get_gear(), GearState::Drive);
        assert_eq!(shifter.get_state().lever_sequence, 0x05);
    }

    #[test]
    fn test_each_position_template() {
        let cases = [
            (GearState::Park, [0x5C, 0x66, 0x00, 0x82, 0xFF, 0x7F, 0x00, 0x80]),
            (GearState::Reverse, [0x7C, 0x24, 0x00, 0x03, 0xFE, 0xFF, 0x01, 0x00]),
            (GearState::Neutral, [0x7C, 0x25, 0x00, 0x04, 0xFD, 0xFF, 0x02, 0x00]),
            (GearState::Drive, [0x7C, 0x24, 0x00, 0x06, 0xFB, 0xFF, 0x04, 0x00]),
            (GearState::Sport, [0x7C, 0x24, 0x00, 0x0A, 0xF7, 0xFF, 0x08, 0x00]),
        ];
        for (position, expected) in cases {
            let frame = encode_gear_status(position, RollingCounter::default());
            assert_eq!(frame.payload(), &expected, "{:?}", position);
        }
    }

    #[test]
    fn test_check_byte_follows_counter() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(1, 0));
        for _ in 0..5 {
            transmit_cycle(&mut shifter, &mut bus, &mut params);
        }
        for frame in bus.sent_with_id(GEAR_STATUS_ID) {
            let counter = frame.byte(2).unwrap();
            assert_eq!(frame.byte(3).unwrap(), counter + 3);
        }
    }

    #[test]
    fn test_same_counter_same_frame() {
        let (mut a, mut bus_a, mut params_a) = setup(OpMode::Run);
        let (mut b, mut bus_b, mut params_b) = setup(OpMode::Run);
        for (shifter, bus, params) in [
            (&mut a, &mut bus_a, &mut params_a),
            (&mut b, &mut bus_b, &mut params_b),
        ] {
            decode(shifter, bus, params, &lever_frame(2, 0));
            for _ in 0..20 {
                transmit_cycle(shifter, bus, params);
            }
        }
        assert_eq!(bus_a.sent(), bus_b.sent());
    }
}

#[cfg(test)]
mod rolling_counter_tests {
    use super::*;

    fn counters(bus: &FrameRecorder) -> Vec<u8> {
        bus.sent_with_id(GEAR_STATUS_ID)
            .map(|f| f.byte(2).unwrap())
            .collect()
    }

    #[test]
    fn test_counter_sequence_outside_park() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(3, 0));
        for _ in 0..18 {
            transmit_cycle(&mut shifter, &mut bus, &mut params);
        }
        let expected: Vec<u8> = (0..15).chain(0..3).collect();
        assert_eq!(counters(&bus), expected);
    }

    #[test]
    fn test_counter_skips_two_in_park() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(0, 0));
        for _ in 0..16 {
            transmit_cycle(&mut shifter, &mut bus, &mut params);
        }
        assert_eq!(
            counters(&bus),
            vec![0, 1, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 0, 1, 4]
        );
    }

    #[test]
    fn test_transmits_every_second_10ms_tick() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        let mut ctx = ModuleContext::new(&mut bus, &mut params);
        shifter.task_10ms(&mut ctx);
        drop(ctx);
        assert_eq!(bus.sent().len(), 0);

        let mut ctx = ModuleContext::new(&mut bus, &mut params);
        shifter.task_10ms(&mut ctx);
        drop(ctx);
        assert_eq!(bus.sent().len(), 1);
    }
}

#[cfg(test)]
mod operating_mode_tests {
    use super::*;

    #[test]
    fn test_non_run_forces_park_on_wire() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Precharge);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(3, 0));
        transmit_cycle(&mut shifter, &mut bus, &mut params);

        let frame = bus.sent()[0];
        assert_eq!(frame.byte(0), Some(0x5C));
        assert_eq!(frame.byte(1), Some(0x66));
        assert_eq!(shifter.get_gear(), GearState::Park);
    }

    #[test]
    fn test_forced_park_persists_until_next_lever_frame() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Off);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(1, 0));
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.requested(), GearState::Park);

        params.set_op_mode(OpMode::Run);
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_gear(), GearState::Park);

        decode(&mut shifter, &mut bus, &mut params, &lever_frame(1, 1));
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_gear(), GearState::Reverse);
    }

    #[test]
    fn test_off_mode_reports_neutral() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(3, 0));
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_gear(), GearState::Drive);

        params.set_op_mode(OpMode::Off);
        tick_100ms(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_gear(), GearState::Neutral);
    }

    #[test]
    fn test_sport_leaves_reported_gear_unchanged() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(3, 0));
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_gear(), GearState::Drive);

        decode(&mut shifter, &mut bus, &mut params, &lever_frame(7, 1));
        transmit_cycle(&mut shifter, &mut bus, &mut params);

        let last = bus.sent().last().copied().unwrap();
        assert_eq!(last.byte(3), Some(0x01 + 10));
        assert_eq!(last.byte(6), Some(0x08));
        assert_eq!(shifter.requested(), GearState::Sport);
        assert_eq!(shifter.get_gear(), GearState::Drive);
    }

    #[test]
    fn test_transmission_suspended_after_shutdown_ticks() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Off);
        for _ in 0..SHUTDOWN_TICKS - 1 {
            tick_100ms(&mut shifter, &mut bus, &mut params);
        }
        assert!(shifter.is_transmitting());
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(bus.take_sent().len(), 1);

        tick_100ms(&mut shifter, &mut bus, &mut params);
        assert!(!shifter.is_transmitting());
        for _ in 0..10 {
            transmit_cycle(&mut shifter, &mut bus, &mut params);
        }
        assert!(bus.sent().is_empty());

        // Shutdown counter saturates
        tick_100ms(&mut shifter, &mut bus, &mut params);
        assert_eq!(shifter.get_state().shutdown_count, SHUTDOWN_TICKS);

        params.set_op_mode(OpMode::Run);
        tick_100ms(&mut shifter, &mut bus, &mut params);
        assert!(shifter.is_transmitting());
        transmit_cycle(&mut shifter, &mut bus, &mut params);
        assert_eq!(bus.sent().len(), 1);
    }
}

#[cfg(test)]
mod decode_tests {
    use super::*;

    #[test]
    fn test_unknown_lever_code_ignored() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(2, 0));
        decode(&mut shifter, &mut bus, &mut params, &lever_frame(5, 1));
        assert_eq!(shifter.requested(), GearState::Neutral);
    }

    #[test]
    fn test_short_frame_ignored() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        let short = Frame::new(LEVER_STATUS_ID, &[0, 0, 0, 0x30]).unwrap();
        decode(&mut shifter, &mut bus, &mut params, &short);
        assert_eq!(shifter.requested(), GearState::Park);
    }

    #[test]
    fn test_other_identifier_ignored() {
        let (mut shifter, mut bus, mut params) = setup(OpMode::Run);
        let other = Frame::new(0x313, &[0, 0, 0, 0x30, 0, 0, 0, 0]).unwrap();
        decode(&mut shifter, &mut bus, &mut params, &other);
        assert_eq!(shifter.requested(), GearState::Park);
    }
}
