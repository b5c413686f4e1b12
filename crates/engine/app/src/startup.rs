//! Controller startup and restart sequences

use xr::{Program, Result};

/// Run every lifecycle phase in order before the frame loop starts
///
/// Core phases are fatal. Marker and plane tracking only log when they
/// cannot be enabled.
pub fn initialize<P: Program + ?Sized>(program: &mut P) -> Result<()> {
    program.create_instance()?;
    program.initialize_system()?;
    initialize_session(program)?;
    tracing::info!("Startup complete");
    Ok(())
}

/// Recreate the session after a loss
///
/// The instance and system are recreated first when the instance went too.
pub fn restart<P: Program + ?Sized>(program: &mut P) -> Result<()> {
    if !program.has_instance() {
        tracing::info!("Recreating instance");
        program.create_instance()?;
        program.initialize_system()?;
    }
    initialize_session(program)?;
    tracing::info!("Session restarted");
    Ok(())
}

fn initialize_session<P: Program + ?Sized>(program: &mut P) -> Result<()> {
    program.initialize_session()?;
    program.create_swapchains()?;
    program.initialize_application()?;

    match program.initialize_marker() {
        Ok(()) => match program.add_marker_images() {
            Ok(count) => tracing::debug!("{} marker images registered", count),
            Err(e) => tracing::warn!("Marker images not registered: {}", e),
        },
        Err(e) => tracing::warn!("Marker tracking unavailable: {}", e),
    }
    if let Err(e) = program.initialize_plane_tracking() {
        tracing::warn!("Plane tracking unavailable: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr::{EventFlags, XrError};

    /// Records the phases it is asked to run
    #[derive(Default)]
    struct PhaseLog {
        calls: Vec<&'static str>,
        instance: bool,
        fail: Option<&'static str>,
    }

    impl PhaseLog {
        fn phase(&mut self, name: &'static str) -> Result<()> {
            self.calls.push(name);
            if self.fail == Some(name) {
                return Err(XrError::runtime(name, "refused"));
            }
            Ok(())
        }
    }

    impl Program for PhaseLog {
        fn create_instance(&mut self) -> Result<()> {
            self.phase("create_instance")?;
            self.instance = true;
            Ok(())
        }
        fn initialize_system(&mut self) -> Result<()> {
            self.phase("initialize_system")
        }
        fn initialize_session(&mut self) -> Result<()> {
            self.phase("initialize_session")
        }
        fn create_swapchains(&mut self) -> Result<()> {
            self.phase("create_swapchains")
        }
        fn initialize_application(&mut self) -> Result<()> {
            self.phase("initialize_application")
        }
        fn initialize_marker(&mut self) -> Result<()> {
            self.phase("initialize_marker")
        }
        fn add_marker_images(&mut self) -> Result<usize> {
            self.phase("add_marker_images").map(|_| 2)
        }
        fn initialize_plane_tracking(&mut self) -> Result<()> {
            self.phase("initialize_plane_tracking")
        }
        fn poll_events(&mut self) -> Result<EventFlags> {
            Ok(EventFlags::CONTINUE)
        }
        fn is_session_running(&self) -> bool {
            false
        }
        fn is_session_focused(&self) -> bool {
            false
        }
        fn poll_actions(&mut self) -> Result<()> {
            Ok(())
        }
        fn render_frame(&mut self) -> Result<()> {
            Ok(())
        }
        fn process_marker_data(&mut self) -> Result<()> {
            Ok(())
        }
        fn process_plane_tracking(&mut self) -> Result<()> {
            Ok(())
        }
        fn has_instance(&self) -> bool {
            self.instance
        }
    }

    #[test]
    fn test_phases_run_in_order() {
        let mut program = PhaseLog::default();
        initialize(&mut program).unwrap();
        assert_eq!(
            program.calls,
            vec![
                "create_instance",
                "initialize_system",
                "initialize_session",
                "create_swapchains",
                "initialize_application",
                "initialize_marker",
                "add_marker_images",
                "initialize_plane_tracking",
            ]
        );
    }

    #[test]
    fn test_core_failure_stops_startup() {
        let mut program = PhaseLog {
            fail: Some("create_swapchains"),
            ..PhaseLog::default()
        };
        assert!(initialize(&mut program).is_err());
        assert_eq!(program.calls.last(), Some(&"create_swapchains"));
    }

    #[test]
    fn test_tracking_failures_are_not_fatal() {
        let mut program = PhaseLog {
            fail: Some("initialize_marker"),
            ..PhaseLog::default()
        };
        initialize(&mut program).unwrap();
        assert!(!program.calls.contains(&"add_marker_images"));
        assert_eq!(program.calls.last(), Some(&"initialize_plane_tracking"));
    }

    #[test]
    fn test_restart_keeps_live_instance() {
        let mut program = PhaseLog {
            instance: true,
            ..PhaseLog::default()
        };
        restart(&mut program).unwrap();
        assert_eq!(program.calls[0], "initialize_session");

        let mut lost = PhaseLog::default();
        restart(&mut lost).unwrap();
        assert_eq!(lost.calls[..2], ["create_instance", "initialize_system"]);
    }
}
