//! Top level boot decision.
//!
//! ```text
//! AwaitChoice --'u'/'U'--> Update --ok--> handoff or reset
//!      |                     |
//!      |                     +--error--> AwaitChoice
//!      +--other--> AttemptBoot --valid--> handoff
//!                      |
//!                      +--invalid--> RecoveryLoop --'u'--> Update --ok--> handoff or reset
//!                                         ^                  |
//!                                         +------error-------+
//! ```
//!
//! The recovery loop has no way out other than a successful update, or
//! power.

use storage::Flash;

use crate::config::{AfterUpdate, Config};
use crate::image::validate;
use crate::partition::AppPartition;
use crate::platform::Platform;
use crate::serial::{Console, Serial};
use crate::update::UpdateSession;
use crate::{Error, Result};

/// Where the bootloader is in its decision loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    AwaitChoice,
    /// An update session is running.  `recovering` selects where a failed
    /// session returns to.
    Update { recovering: bool },
    AttemptBoot,
    RecoveryLoop,
}

/// How the bootloader finished.  Performing it is irreversible, so it is
/// handed back to the board rather than done here.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Exit {
    Handoff { entry: usize },
    Reset,
}

impl Exit {
    pub fn finish<P: Platform>(self, platform: &mut P) -> ! {
        match self {
            Exit::Handoff { entry } => platform.jump(entry),
            Exit::Reset => platform.reset(),
        }
    }
}

pub struct Bootloader<F, S> {
    partition: AppPartition<F>,
    console: Console<S>,
    config: Config,
    state: State,
}

impl<F: Flash, S: Serial> Bootloader<F, S> {
    pub fn new(flash: F, port: S, config: Config) -> Bootloader<F, S> {
        Bootloader {
            partition: AppPartition::new(flash, config.partition),
            console: Console::new(port, config.crlf),
            config,
            state: State::AwaitChoice,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn console(&self) -> &Console<S> {
        &self.console
    }

    /// Run until there is an image to hand off to, or a reset is due.  Only
    /// returns an error if the serial line itself fails.
    pub fn run(&mut self) -> Result<Exit> {
        self.banner()?;
        self.console.puts("BOOT?\n")?;
        self.state = State::AwaitChoice;

        loop {
            let state = self.state;
            self.state = match state {
                State::AwaitChoice => self.await_choice()?,
                State::Update { recovering } => match self.update() {
                    Ok(exit) => return Ok(exit),
                    Err(Error::Serial(e)) => return Err(e.into()),
                    Err(_) if recovering => State::RecoveryLoop,
                    Err(_) => State::AwaitChoice,
                },
                State::AttemptBoot => match validate(&mut self.partition) {
                    Ok(image) => {
                        info!("booting image version {}", image.header.version);
                        self.announce_jump()?;
                        return Ok(Exit::Handoff { entry: image.entry });
                    }
                    Err(e) => {
                        match e {
                            Error::Invalid(why) => self.console.puts(why.message())?,
                            _ => self.console.puts("Error: Flash read failed")?,
                        }
                        self.console.puts("\n")?;
                        self.console
                            .puts("Recovery Loop: No valid app found. Press 'u' to update.\n")?;
                        State::RecoveryLoop
                    }
                },
                State::RecoveryLoop => {
                    if self.console.getc()? == b'u' {
                        State::Update { recovering: true }
                    } else {
                        State::RecoveryLoop
                    }
                }
            };
        }
    }

    fn await_choice(&mut self) -> Result<State> {
        let choice = self.console.getc()?;
        self.console.putc(choice)?;
        let enter = choice == b'\r' || choice == b'\n';
        if !enter {
            self.console.puts("\n")?;
        }
        Ok(match choice {
            b'u' | b'U' => State::Update { recovering: false },
            _ => State::AttemptBoot,
        })
    }

    fn update(&mut self) -> Result<Exit> {
        let header =
            UpdateSession::new(&mut self.partition, &mut self.console, self.config.version)
                .run()?;
        info!("update of {} bytes complete", header.size);
        match self.config.after_update {
            AfterUpdate::Handoff => {
                self.announce_jump()?;
                Ok(Exit::Handoff { entry: self.partition.entry() })
            }
            AfterUpdate::Reset => Ok(Exit::Reset),
        }
    }

    fn banner(&mut self) -> Result<()> {
        self.console.puts("======================================\n")?;
        self.console.puts("   Serial Update Bootloader\n")?;
        self.console.puts("   Target: ")?;
        self.console.puts(self.config.platform_name)?;
        self.console.puts("\n======================================\n")?;
        Ok(())
    }

    fn announce_jump(&mut self) -> Result<()> {
        self.console.puts("Jumping to application...\n")?;
        self.console.puts("APP_HANDOFF\n")?;
        Ok(())
    }
}
