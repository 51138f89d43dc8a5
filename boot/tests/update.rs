// Update sessions, driven by a scripted host.

use boot::checksum::checksum;
use boot::{
    validate, AppPartition, Console, Error, FirmwareHeader, ProtocolError, SerialError,
    StorageError, UpdateSession, ValidationError, BOOT_MAGIC, HEADER_SIZE,
};
use simflash::gen::GenBuilder;
use simflash::styles::{self, TargetLayout, ALL_TARGETS};
use simflash::{SimFlash, SimSerial};
use storage::{Flash, NorDriver};

const SUCCESS: &str = "OK\nERASING...\nREADY\nCRC?\nOK\nREBOOT\n";

struct Outcome {
    result: Result<FirmwareHeader, Error>,
    transcript: String,
    consumed: usize,
}

fn session<F: Flash>(target: &TargetLayout, flash: F, input: &[u8]) -> Outcome {
    let mut part = AppPartition::new(flash, target.app);
    let mut console = Console::new(SimSerial::with_input(input), false);
    let result = UpdateSession::new(&mut part, &mut console, 1).run();
    let port = console.into_inner();
    Outcome {
        result,
        transcript: port.transcript(),
        consumed: port.consumed(),
    }
}

fn check<F: Flash>(target: &TargetLayout, flash: F) -> Result<boot::Image, Error> {
    validate(&mut AppPartition::new(flash, target.app))
}

/// A flash holding a valid image, so that "unchanged" means something.
fn with_image(target: &TargetLayout) -> NorDriver<SimFlash> {
    let mut flash = target.build().unwrap();
    GenBuilder::default()
        .size(512)
        .seed(99)
        .build()
        .unwrap()
        .install(&mut flash, target.app)
        .unwrap();
    flash
}

#[test]
fn upload_then_boot() {
    for target in ALL_TARGETS {
        let max = target.app.len - HEADER_SIZE;
        for size in [1, 255, 256, 257, 3000, max] {
            let img = GenBuilder::default().size(size).seed(size + 7).build().unwrap();
            let mut flash = with_image(target);

            let out = session(target, &mut flash, &img.upload());
            assert_eq!(out.result.unwrap(), img.header);
            assert_eq!(out.transcript, SUCCESS);

            let image = check(target, &mut flash).unwrap();
            assert_eq!(image.header, img.header);
            assert_eq!(image.entry, target.app.base + HEADER_SIZE);

            let stored = &flash.inner().data()[target.app.base - target.origin..];
            assert_eq!(&stored[..HEADER_SIZE + size], &img.data()[..]);
        }
    }
}

/// Upload and boot on a device that programs `WRITE_SIZE` bytes at a time.
/// Neither the header nor the chunks line up with its write units.
fn upload_with_write_size<const WRITE_SIZE: usize>() {
    for target in ALL_TARGETS {
        for size in [1, 5, 17, 300, 1000] {
            let img = GenBuilder::default().size(size).seed(size).build().unwrap();
            let mut flash = target.build_sized::<WRITE_SIZE>().unwrap();

            let out = session(target, &mut flash, &img.upload());
            assert_eq!(out.result.unwrap(), img.header, "write size {}", WRITE_SIZE);
            assert_eq!(out.transcript, SUCCESS);
            assert_eq!(check(target, &mut flash).unwrap().header, img.header);

            let stored = &flash.inner().data()[target.app.base - target.origin..];
            assert_eq!(&stored[..HEADER_SIZE + size], &img.data()[..]);
        }
    }
}

#[test]
fn upload_then_boot_write_sizes() {
    upload_with_write_size::<4>();
    upload_with_write_size::<8>();
    upload_with_write_size::<32>();
    upload_with_write_size::<256>();
    upload_with_write_size::<512>();
}

#[test]
fn dead_beef() {
    let target = &styles::QEMU_VIRT;
    let mut flash = target.build().unwrap();

    let out = session(target, &mut flash, b"SEND 4\n\xde\xad\xbe\xef");
    let header = out.result.unwrap();
    assert_eq!(out.transcript, SUCCESS);
    assert_eq!(header.magic, BOOT_MAGIC);
    assert_eq!(header.size, 4);
    assert_eq!(header.checksum, checksum(&[0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(header.version, 1);

    let image = check(target, &mut flash).unwrap();
    assert_eq!(image.header, header);
    assert_eq!(image.entry, 0x8001_0010);
}

#[test]
fn size_limits_touch_nothing() {
    for target in ALL_TARGETS {
        let max = target.app.len - HEADER_SIZE;
        for line in [
            "SEND 0\n".to_string(),
            format!("SEND {}\n", max + 1),
            "SEND \r".to_string(),
        ] {
            let mut flash = with_image(target);
            let before = flash.inner().snapshot();
            let (writes, erases) = (flash.inner().writes(), flash.inner().erases());

            let out = session(target, &mut flash, line.as_bytes());
            assert_eq!(out.result, Err(Error::Protocol(ProtocolError::SizeOutOfRange)));
            assert_eq!(out.transcript, "OK\nERR: SIZE\n");
            assert_eq!(flash.inner().data(), &before[..]);
            assert_eq!((flash.inner().writes(), flash.inner().erases()), (writes, erases));
            check(target, &mut flash).unwrap();
        }
    }
}

#[test]
fn command_mismatch_at_every_byte() {
    let target = &styles::SMALL;
    for pos in 0..5 {
        let mut input = b"SEND 4\n\x01\x02\x03\x04".to_vec();
        input[pos] = b'?';
        let mut flash = with_image(target);
        let before = flash.inner().snapshot();

        let out = session(target, &mut flash, &input);
        assert_eq!(out.result, Err(Error::Protocol(ProtocolError::CommandMismatch)));
        assert_eq!(out.transcript, "OK\nERR: CMD\n");
        assert_eq!(out.consumed, pos + 1);
        assert_eq!(flash.inner().data(), &before[..]);
    }
}

#[test]
fn lowercase_command_rejected() {
    let target = &styles::SMALL;
    let mut flash = target.build().unwrap();
    let out = session(target, &mut flash, b"send 4\n");
    assert_eq!(out.result, Err(Error::Protocol(ProtocolError::CommandMismatch)));
    assert_eq!(flash.inner().writes(), 0);
}

#[test]
fn erase_failure() {
    let target = &styles::SMALL;
    let mut flash = with_image(target);
    flash.inner_mut().fail_erase(true);

    let out = session(target, &mut flash, b"SEND 4\nabcd");
    assert_eq!(out.result, Err(Error::Storage(StorageError::EraseFailed)));
    assert_eq!(out.transcript, "OK\nERASING...\nERR: ERASE\n");
    // The payload was never read.
    assert_eq!(out.consumed, 7);
}

#[test]
fn interrupted_transfer_never_validates() {
    for target in ALL_TARGETS {
        let mut flash = with_image(target);
        check(target, &mut flash).unwrap();

        // The old image header is still there, but the erase takes it out.
        let img = GenBuilder::default().size(1000).build().unwrap();
        let upload = img.upload();
        let out = session(target, &mut flash, &upload[..upload.len() - 10]);
        assert_eq!(out.result, Err(Error::Serial(SerialError::Closed)));
        assert_eq!(out.transcript, "OK\nERASING...\nREADY\n");

        assert_eq!(
            check(target, &mut flash),
            Err(Error::Invalid(ValidationError::BadMagic))
        );
    }
}

#[test]
fn header_commit_failure() {
    let target = &styles::SMALL;
    let mut flash = with_image(target);
    flash
        .inner_mut()
        .fail_write_at(Some(target.app.base - target.origin));

    let img = GenBuilder::default().size(600).build().unwrap();
    let out = session(target, &mut flash, &img.upload());
    assert_eq!(out.result, Err(Error::Storage(StorageError::HeaderCommitFailed)));
    assert_eq!(out.transcript, "OK\nERASING...\nREADY\nERR: HEADER\n");

    // The payload made it, the header did not.
    let payload = target.app.base - target.origin + HEADER_SIZE;
    assert_eq!(&flash.inner().data()[payload..payload + 600], &img.payload[..]);
    assert_eq!(
        check(target, &mut flash),
        Err(Error::Invalid(ValidationError::BadMagic))
    );
}

#[test]
fn power_loss_before_commit() {
    let target = &styles::SMALL;
    let mut flash = target.build().unwrap();
    // 600 bytes arrive as three chunks; the power goes just after them.
    flash.inner_mut().power_loss_after(3);

    let img = GenBuilder::default().size(600).build().unwrap();
    let out = session(target, &mut flash, &img.upload());
    assert_eq!(out.result, Err(Error::Storage(StorageError::HeaderCommitFailed)));

    flash.inner_mut().heal();
    assert_eq!(
        check(target, &mut flash),
        Err(Error::Invalid(ValidationError::BadMagic))
    );
}

#[test]
fn payload_write_failure() {
    let target = &styles::SMALL;
    let mut flash = target.build().unwrap();
    let payload = target.app.base - target.origin + HEADER_SIZE;
    flash.inner_mut().fail_write_at(Some(payload + 300));

    let img = GenBuilder::default().size(600).build().unwrap();
    let out = session(target, &mut flash, &img.upload());
    assert_eq!(out.result, Err(Error::Storage(StorageError::WriteFailed)));
    assert_eq!(out.transcript, "OK\nERASING...\nREADY\nERR: WRITE\n");
    assert!(check(target, &mut flash).is_err());
}

#[test]
fn trailing_bytes_stay_queued() {
    let target = &styles::SMALL;
    let mut flash = target.build().unwrap();
    let out = session(target, &mut flash, b"SEND 2\r\nxyz");
    let header = out.result.unwrap();
    assert_eq!(header.checksum, checksum(b"\nx"));
    assert_eq!(out.consumed, 9);
}
