use partition_common::outcome::slack;
use partition_common::{classify, BuildOutcome, ClassifyError, Layout};

use crate::config::Session;
use crate::flash_args::{self, FlashCommand};
use crate::runner::{BuildOutput, BuildRunner, Pass};
use crate::util::Error;
use crate::{sdkconfig, table};

/// Sessions only move forward; at most one retry is ever made.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Initial,
    Retried,
    Done,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resize {
    /// The app overflowed by `overflow` bytes.
    Grow { overflow: u32 },
    /// The app left `slack` bytes unused.
    Shrink { slack: u32 },
}

#[derive(Debug, Clone)]
pub struct Report {
    pub layout: Layout,
    pub binary_size: u32,
    pub passes: u8,
    pub resize: Option<Resize>,
    pub flash: Option<FlashCommand>,
}

pub struct Controller<R> {
    session: Session,
    runner: R,
    layout: Layout,
    state: State,
    passes: u8,
    resize: Option<Resize>,
}

impl<R: BuildRunner> Controller<R> {
    /// Plans the first table. Fails before any build when the flash is too small.
    pub fn new(session: Session, runner: R) -> Result<Self, Error> {
        let layout = Layout::new(session.initial_app_size(), session.capacity(), session.bank)?;

        Ok(Self {
            session,
            runner,
            layout,
            state: State::Initial,
            passes: 0,
            resize: None,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn passes(&self) -> u8 {
        self.passes
    }

    pub async fn run(&mut self) -> Result<Report, Error> {
        if self.state != State::Initial {
            return Err(Error::Other("build session already ran".to_string()));
        }

        let res = self.drive().await;
        self.state = State::Done;
        res
    }

    async fn drive(&mut self) -> Result<Report, Error> {
        let table_path = self.session.table_path();
        table::write_atomic(
            &self.session.sdkconfig_path(),
            &sdkconfig::render(&self.session, &table_path),
        )
        .await?;
        table::save(&table_path, &self.layout).await?;

        let first = self.build(Pass::First).await?;
        if first.exit_code != 0 && !self.session.auto_resize() {
            return Err(Error::Build {
                exit_code: first.exit_code,
            });
        }

        let next = match classify(first.exit_code, &first.output)? {
            BuildOutcome::Failure { exit_code } => return Err(Error::Build { exit_code }),
            BuildOutcome::Overflow { overflow } => {
                log::warn!("app overflows its partition by {:#x} bytes", overflow);
                self.resize = Some(Resize::Grow { overflow });
                self.layout.grow(overflow)?
            }
            BuildOutcome::Success { binary_size } => {
                let slack = slack(self.layout.app_size(), binary_size);
                if !self.session.auto_resize() || slack <= self.session.shrink_threshold {
                    return Ok(self.report(binary_size, &first));
                }
                log::info!("app leaves {:#x} bytes of its partition unused", slack);
                self.resize = Some(Resize::Shrink { slack });
                self.layout.shrink(slack)?
            }
        };

        log::info!(
            "resizing app partition {:#x} -> {:#x}",
            self.layout.app_size(),
            next.app_size()
        );
        self.layout = next;
        table::save(&table_path, &self.layout).await?;
        self.state = State::Retried;

        // whatever the second pass reports is final
        let second = self.build(Pass::Second).await?;
        if second.exit_code != 0 {
            return Err(Error::Build {
                exit_code: second.exit_code,
            });
        }
        let BuildOutcome::Success { binary_size } = classify(0, &second.output)? else {
            return Err(ClassifyError::BinarySize.into());
        };

        Ok(self.report(binary_size, &second))
    }

    async fn build(&mut self, pass: Pass) -> Result<BuildOutput, Error> {
        self.passes += 1;
        let output = self.runner.run(pass).await?;
        if output.exit_code != 0 {
            log::error!("{:?} build pass exited with {}", pass, output.exit_code);
        }
        Ok(output)
    }

    fn report(&self, binary_size: u32, output: &BuildOutput) -> Report {
        log::info!(
            "binary {:#x} bytes in {:#x} byte app partition",
            binary_size,
            self.layout.app_size()
        );

        Report {
            layout: self.layout.clone(),
            binary_size,
            passes: self.passes,
            resize: self.resize,
            flash: flash_args::parse(&output.output),
        }
    }
}
