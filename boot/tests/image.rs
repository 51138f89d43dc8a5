// Image validation.

use boot::{validate, AppPartition, Error, FirmwareHeader, ValidationError, HEADER_SIZE};
use simflash::gen::GenBuilder;
use simflash::styles::{self, TargetLayout, ALL_TARGETS};
use simflash::SimFlash;
use storage::{Flash, NorDriver};

fn installed(target: &TargetLayout, size: usize) -> AppPartition<NorDriver<SimFlash>> {
    let img = GenBuilder::default().size(size).seed(size).build().unwrap();
    let mut flash = target.build().unwrap();
    img.install(&mut flash, target.app).unwrap();
    AppPartition::new(flash, target.app)
}

/// Device offset of a payload byte.
fn payload_offset(target: &TargetLayout, index: usize) -> usize {
    target.app.base - target.origin + HEADER_SIZE + index
}

#[test]
fn image_test() {
    for target in ALL_TARGETS {
        for size in [1, 4, 1000, target.app.len - HEADER_SIZE] {
            let mut part = installed(target, size);
            let image = validate(&mut part).unwrap();
            assert_eq!(image.header.size as usize, size);
            assert_eq!(image.entry, target.app.base + HEADER_SIZE);
        }
    }
}

#[test]
fn erased_partition() {
    let target = &styles::SMALL;
    let mut part = AppPartition::new(target.build().unwrap(), target.app);
    assert_eq!(validate(&mut part), Err(Error::Invalid(ValidationError::BadMagic)));
}

#[test]
fn implausible_sizes() {
    let target = &styles::SMALL;
    let max = (target.app.len - HEADER_SIZE) as u32;
    for size in [0, max + 1, u32::MAX] {
        let mut flash = target.build().unwrap();
        let header = FirmwareHeader::new(size, 0, 1);
        flash.raw_write(target.app.base, &header.to_bytes()).unwrap();
        let mut part = AppPartition::new(flash, target.app);
        assert_eq!(
            validate(&mut part),
            Err(Error::Invalid(ValidationError::BadSize)),
            "size {}",
            size
        );
    }
}

#[test]
fn any_bit_flip_is_caught() {
    let target = &styles::SMALL;
    let size = 300;
    for index in [0, 1, 150, size - 1] {
        for bit in [0, 3, 7] {
            let mut part = installed(target, size);
            part.flash_mut()
                .inner_mut()
                .flip_bit(payload_offset(target, index), bit);
            assert_eq!(
                validate(&mut part),
                Err(Error::Invalid(ValidationError::ChecksumMismatch)),
                "byte {} bit {}",
                index,
                bit
            );
        }
    }
}

#[test]
fn not_cached() {
    let target = &styles::SMALL;
    let mut part = installed(target, 64);
    validate(&mut part).unwrap();

    part.flash_mut().inner_mut().flip_bit(payload_offset(target, 10), 2);
    assert!(validate(&mut part).is_err());

    part.flash_mut().inner_mut().flip_bit(payload_offset(target, 10), 2);
    validate(&mut part).unwrap();
}

#[test]
fn corrupt_magic() {
    let target = &styles::SMALL;
    let mut part = installed(target, 64);
    part.flash_mut()
        .inner_mut()
        .flip_bit(target.app.base - target.origin, 0);
    assert_eq!(validate(&mut part), Err(Error::Invalid(ValidationError::BadMagic)));
}

#[test]
fn read_faults_are_not_bootable() {
    let target = &styles::SMALL;
    let header = target.app.base - target.origin;
    for offset in [header + 4, payload_offset(target, 200)] {
        let mut part = installed(target, 300);
        part.flash_mut().inner_mut().fail_read_at(Some(offset));
        assert_eq!(
            validate(&mut part),
            Err(Error::Flash(storage::Error::Device)),
            "offset {:#x}",
            offset
        );

        part.flash_mut().inner_mut().heal();
        validate(&mut part).unwrap();
    }
}
