/// Volume and mute state
///
/// Two-state machine {unmuted, muted}. Setting the volume to zero mutes and
/// remembers the last audible volume; any later non-zero volume or a mute
/// toggle brings sound back.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeController {
    /// Last explicitly set volume (0.0-1.0)
    current_volume: f32,
    is_muted: bool,
    /// Volume restored on unmute
    volume_before_mute: f32,
    default_volume: f32,
}

impl VolumeController {
    /// Unmuted at `default_volume`
    pub fn new(default_volume: f32) -> Self {
        let default_volume = default_volume.clamp(0.0, 1.0);
        Self {
            current_volume: default_volume,
            is_muted: false,
            volume_before_mute: default_volume,
            default_volume,
        }
    }

    /// Set the volume; returns the effective gain to apply
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };

        if volume == 0.0 {
            if !self.is_muted {
                self.is_muted = true;
                if self.current_volume > 0.0 {
                    self.volume_before_mute = self.current_volume;
                }
            }
        } else if self.is_muted {
            self.is_muted = false;
            self.volume_before_mute = volume;
        }

        self.current_volume = volume;
        self.effective_gain()
    }

    /// Flip mute; returns the new mute flag
    pub fn toggle_mute(&mut self) -> bool {
        if self.is_muted {
            self.is_muted = false;
            self.current_volume = self.restore_volume();
        } else {
            self.is_muted = true;
            if self.current_volume > 0.0 {
                self.volume_before_mute = self.current_volume;
            }
        }
        self.is_muted
    }

    fn restore_volume(&self) -> f32 {
        if self.volume_before_mute > 0.0 {
            self.volume_before_mute
        } else if self.default_volume > 0.0 {
            self.default_volume
        } else {
            1.0
        }
    }

    /// Nominal volume, not the muted zero
    pub fn volume(&self) -> f32 {
        self.current_volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Gain actually applied to the output
    pub fn effective_gain(&self) -> f32 {
        if self.is_muted {
            0.0
        } else {
            self.current_volume
        }
    }

    pub fn volume_before_mute(&self) -> f32 {
        self.volume_before_mute
    }
}

impl Default for VolumeController {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let volume = VolumeController::new(0.6);
        assert_eq!(volume.volume(), 0.6);
        assert!(!volume.is_muted());
        assert_eq!(volume.effective_gain(), 0.6);
    }

    #[test]
    fn test_volume_clamping() {
        let mut volume = VolumeController::default();
        assert_eq!(volume.set_volume(1.5), 1.0);
        assert_eq!(volume.set_volume(f32::NAN), 0.0);
        assert!(volume.is_muted());

        let volume = VolumeController::new(-3.0);
        assert_eq!(volume.volume(), 0.0);
    }

    #[test]
    fn test_toggle_round_trip() {
        let mut volume = VolumeController::default();
        volume.set_volume(0.7);

        assert!(volume.toggle_mute());
        assert_eq!(volume.effective_gain(), 0.0);
        assert_eq!(volume.volume(), 0.7);

        assert!(!volume.toggle_mute());
        assert_eq!(volume.volume(), 0.7);
        assert_eq!(volume.effective_gain(), 0.7);
    }

    #[test]
    fn test_zero_volume_mutes_and_toggle_restores() {
        let mut volume = VolumeController::default();
        volume.set_volume(0.7);
        assert_eq!(volume.set_volume(0.0), 0.0);
        assert!(volume.is_muted());
        assert_eq!(volume.volume_before_mute(), 0.7);

        assert!(!volume.toggle_mute());
        assert_eq!(volume.volume(), 0.7);
        assert_eq!(volume.effective_gain(), 0.7);
    }

    #[test]
    fn test_nonzero_volume_unmutes() {
        let mut volume = VolumeController::default();
        volume.toggle_mute();
        assert!(volume.is_muted());

        assert_eq!(volume.set_volume(0.3), 0.3);
        assert!(!volume.is_muted());
    }

    #[test]
    fn test_repeated_cycles_do_not_drift() {
        let mut volume = VolumeController::default();
        volume.set_volume(0.42);
        for _ in 0..100 {
            volume.toggle_mute();
            volume.toggle_mute();
            volume.set_volume(0.0);
            volume.toggle_mute();
        }
        assert_eq!(volume.volume(), 0.42);
        assert!(!volume.is_muted());
    }

    #[test]
    fn test_unmute_without_remembered_volume() {
        let mut volume = VolumeController::new(0.0);
        assert!(volume.toggle_mute());
        assert!(!volume.toggle_mute());
        assert_eq!(volume.volume(), 1.0);
    }
}
