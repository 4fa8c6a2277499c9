use crate::field::{FlowField, FlowLine};

// Animation time advances a fixed step per tick; pacing lives in the
// frame loop, not here.
const TIME_STEP_MS: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DriverState {
    Uninitialized,
    Running,
    Stopped,
}

/// Owns one animation: its field, its clock and its lifecycle. A driver
/// runs exactly one surface; superseding it means building a new driver
/// and dropping this one, so two loops can never feed the same canvas.
pub(crate) struct Driver {
    state: DriverState,
    field: FlowField,
    width: f32,
    height: f32,
    time: f32,
}

impl Driver {
    pub(crate) fn new(field: FlowField) -> Self {
        Self {
            state: DriverState::Uninitialized,
            field,
            width: 0.0,
            height: 0.0,
            time: 0.0,
        }
    }

    pub(crate) fn state(&self) -> DriverState {
        self.state
    }

    pub(crate) fn time(&self) -> f32 {
        self.time
    }

    pub(crate) fn line_count(&self) -> usize {
        self.field.line_count()
    }

    /// First mount, once the real surface size is known. Only moves out
    /// of `Uninitialized`; a mounted or stopped driver ignores it.
    pub(crate) fn mount(&mut self, width: f32, height: f32) {
        if self.state != DriverState::Uninitialized {
            return;
        }
        self.width = width;
        self.height = height;
        self.field.initialize(width, height, false);
        self.state = DriverState::Running;
    }

    /// New surface size. Seeds regenerate only if the layout class
    /// flipped; otherwise the batch is kept and only the exit bounds move.
    pub(crate) fn resize(&mut self, width: f32, height: f32) {
        if self.state != DriverState::Running {
            return;
        }
        self.width = width;
        self.height = height;
        self.field.initialize(width, height, false);
    }

    /// Throws the current batch away and places a fresh one.
    pub(crate) fn reseed(&mut self) {
        if self.state != DriverState::Running {
            return;
        }
        self.field.initialize(self.width, self.height, true);
    }

    pub(crate) fn set_line_count(&mut self, n: usize) {
        self.field.set_line_count(n);
        if self.state == DriverState::Running {
            self.field.initialize(self.width, self.height, true);
        }
    }

    /// One animation tick. The liveness check comes first: the moment the
    /// surface is reported gone the driver stops for good and this tick
    /// already yields no frame. Otherwise lines are traced at the current
    /// animation time and the clock moves forward.
    pub(crate) fn tick(&mut self, attached: bool) -> Option<Vec<FlowLine>> {
        if self.state == DriverState::Running && !attached {
            self.state = DriverState::Stopped;
            return None;
        }
        if self.state != DriverState::Running {
            return None;
        }
        self.field.initialize(self.width, self.height, false);
        let lines = self.field.trace(self.width, self.height, self.time);
        self.time += TIME_STEP_MS;
        Some(lines)
    }
}
