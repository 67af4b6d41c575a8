use crate::error::Result;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    pub soft: u64,
    pub hard: u64,
}

/// Execution-time and memory ceilings; `None` when the platform has no such knob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    pub cpu: Option<Limit>,
    pub memory: Option<Limit>,
}

impl Limits {
    /// Every soft limit lifted to its hard ceiling.
    pub fn raised(&self) -> Self {
        let lift = |l: Option<Limit>| l.map(|l| Limit { soft: l.hard, ..l });
        Self {
            cpu: lift(self.cpu),
            memory: lift(self.memory),
        }
    }
}

pub trait LimitControl {
    fn current(&self) -> Result<Limits>;
    fn apply(&self, limits: &Limits) -> Result<()>;
}

/// Leaves the process limits alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLimits;

impl LimitControl for NoLimits {
    fn current(&self) -> Result<Limits> {
        Ok(Limits::default())
    }

    fn apply(&self, _limits: &Limits) -> Result<()> {
        Ok(())
    }
}

/// POSIX resource limits of the current process.
#[cfg(unix)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RlimitControl;

#[cfg(unix)]
impl LimitControl for RlimitControl {
    fn current(&self) -> Result<Limits> {
        use nix::sys::resource::{Resource, getrlimit};

        let read = |r: Resource| -> Result<Option<Limit>> {
            let (soft, hard) = getrlimit(r).map_err(std::io::Error::from)?;
            Ok(Some(Limit {
                soft: soft as u64,
                hard: hard as u64,
            }))
        };
        Ok(Limits {
            cpu: read(Resource::RLIMIT_CPU)?,
            #[cfg(target_os = "linux")]
            memory: read(Resource::RLIMIT_AS)?,
            #[cfg(not(target_os = "linux"))]
            memory: None,
        })
    }

    fn apply(&self, limits: &Limits) -> Result<()> {
        use nix::libc::rlim_t;
        use nix::sys::resource::{Resource, setrlimit};

        let write = |r: Resource, l: Option<Limit>| -> Result<()> {
            if let Some(l) = l {
                setrlimit(r, l.soft as rlim_t, l.hard as rlim_t).map_err(std::io::Error::from)?;
            }
            Ok(())
        };
        write(Resource::RLIMIT_CPU, limits.cpu)?;
        #[cfg(target_os = "linux")]
        write(Resource::RLIMIT_AS, limits.memory)?;
        Ok(())
    }
}

/// The limit control for this platform.
pub fn platform_limits() -> Box<dyn LimitControl> {
    #[cfg(unix)]
    {
        Box::new(RlimitControl)
    }
    #[cfg(not(unix))]
    {
        Box::new(NoLimits)
    }
}

/// Raises limits on creation and puts the saved ones back on drop.
pub struct LimitsGuard<'a> {
    control: &'a dyn LimitControl,
    saved: Limits,
}

impl<'a> LimitsGuard<'a> {
    pub fn raise(control: &'a dyn LimitControl) -> Result<Self> {
        let saved = control.current()?;
        control.apply(&saved.raised())?;
        debug!("raised limits from {saved:?}");
        Ok(Self { control, saved })
    }

    pub fn saved(&self) -> &Limits {
        &self.saved
    }
}

impl Drop for LimitsGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.control.apply(&self.saved) {
            warn!("could not restore process limits: {e}");
        }
    }
}
