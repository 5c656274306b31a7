/// Emitted whenever the current time changes. Always carries absolute time
/// so listeners never have to accumulate deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEvent {
    TimeChanged(f32),
}

pub const DEFAULT_SLIDER_GRANULARITY: u32 = 1000;

/// Playback position with play/pause, a scrub slider and a speed factor.
#[derive(Debug, Clone)]
pub struct Timeline {
    speed_factor: f32,
    max_time: f32,
    current_time: f32,
    slider_granularity: u32,
    playing: bool,
    was_playing: bool,
    events: Vec<TimelineEvent>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_SLIDER_GRANULARITY)
    }
}

impl Timeline {
    pub fn new(slider_granularity: u32) -> Self {
        Self {
            speed_factor: 1.0,
            max_time: 0.0,
            current_time: 0.0,
            slider_granularity: slider_granularity.max(1),
            playing: false,
            was_playing: false,
            events: Vec::new(),
        }
    }

    fn emit(&mut self) {
        self.events.push(TimelineEvent::TimeChanged(self.current_time));
    }

    pub fn take_events(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn speed_factor(&self) -> f32 {
        self.speed_factor
    }

    pub fn max_time(&self) -> f32 {
        self.max_time
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_max_time(&mut self, max_time: f32) {
        self.max_time = max_time.max(0.0);
        if self.current_time > self.max_time {
            self.set_current_time(self.max_time);
        }
    }

    pub fn set_current_time(&mut self, current_time: f32) {
        self.current_time = current_time.clamp(0.0, self.max_time);
        self.emit();
    }

    pub fn reset(&mut self) {
        self.playing = false;
        self.was_playing = false;
        self.max_time = 0.0;
        self.current_time = 0.0;
        self.emit();
    }

    pub fn speed_changed(&mut self, speed: f32) {
        self.speed_factor = speed.max(0.0);
    }

    pub fn toggle_playing(&mut self) {
        self.playing = !self.playing;
    }

    pub fn slider_moved(&mut self, pos: u32) {
        let pos = pos.min(self.slider_granularity);
        self.current_time = pos as f32 / self.slider_granularity as f32 * self.max_time;
        self.emit();
    }

    pub fn slider_pressed(&mut self) {
        self.was_playing = self.playing;
        self.playing = false;
    }

    pub fn slider_released(&mut self) {
        self.playing = self.was_playing;
    }

    pub fn tick(&mut self, dt: f32) {
        if !self.playing || self.max_time <= 0.0 {
            return;
        }
        let mut t = self.current_time + dt * self.speed_factor;
        if t > self.max_time {
            t = t.rem_euclid(self.max_time);
        }
        self.current_time = t;
        self.emit();
    }

    /// Slider position matching the current time.
    pub fn slider_position(&self) -> u32 {
        if self.max_time <= 0.0 {
            return 0;
        }
        ((self.current_time / self.max_time) * self.slider_granularity as f32).round() as u32
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let label = if self.playing { "⏸" } else { "▶" };
            if ui
                .add_enabled(self.max_time > 0.0, egui::Button::new(label))
                .on_hover_text("Play / pause")
                .clicked()
            {
                self.toggle_playing();
            }

            let mut pos = self.slider_position();
            let width = (ui.available_width() - 220.0).max(80.0);
            ui.spacing_mut().slider_width = width;
            let response = ui.add_enabled(
                self.max_time > 0.0,
                egui::Slider::new(&mut pos, 0..=self.slider_granularity).show_value(false),
            );
            if response.drag_started() {
                self.slider_pressed();
            }
            if response.changed() {
                self.slider_moved(pos);
            }
            if response.drag_stopped() {
                self.slider_released();
            }

            ui.label(format!("{:.2} / {:.2} s", self.current_time, self.max_time));
            ui.separator();

            let mut speed = self.speed_factor;
            if ui
                .add(
                    egui::DragValue::new(&mut speed)
                        .speed(0.05)
                        .range(0.0..=10.0)
                        .prefix("speed ")
                        .suffix("x"),
                )
                .changed()
            {
                self.speed_changed(speed);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(t: &mut Timeline) -> Vec<f32> {
        t.take_events()
            .into_iter()
            .map(|TimelineEvent::TimeChanged(v)| v)
            .collect()
    }

    #[test]
    fn current_time_is_clamped() {
        let mut t = Timeline::default();
        t.set_max_time(2.0);
        t.set_current_time(5.0);
        t.set_current_time(-1.0);
        assert_eq!(times(&mut t), vec![2.0, 0.0]);

        t.set_current_time(1.5);
        t.set_max_time(1.0);
        assert_eq!(t.current_time(), 1.0);
        t.set_max_time(-3.0);
        assert_eq!(t.max_time(), 0.0);
    }

    #[test]
    fn tick_advances_with_speed_and_wraps() {
        let mut t = Timeline::default();
        t.set_max_time(1.0);
        t.take_events();

        t.tick(0.5);
        assert!(times(&mut t).is_empty(), "paused timeline must not move");

        t.toggle_playing();
        t.speed_changed(2.0);
        t.tick(0.25);
        assert_eq!(times(&mut t), vec![0.5]);
        t.tick(0.375);
        assert_eq!(t.current_time(), 0.25);

        t.speed_changed(-1.0);
        assert_eq!(t.speed_factor(), 0.0);
    }

    #[test]
    fn tick_without_duration_is_idle() {
        let mut t = Timeline::default();
        t.toggle_playing();
        t.tick(1.0);
        assert!(t.take_events().is_empty());
    }

    #[test]
    fn slider_scrub_pauses_then_restores() {
        let mut t = Timeline::new(100);
        t.set_max_time(4.0);
        t.toggle_playing();
        t.take_events();

        t.slider_pressed();
        assert!(!t.is_playing());
        t.slider_moved(25);
        assert_eq!(times(&mut t), vec![1.0]);
        assert_eq!(t.slider_position(), 25);
        t.slider_released();
        assert!(t.is_playing());
    }

    #[test]
    fn reset_stops_and_zeroes() {
        let mut t = Timeline::default();
        t.set_max_time(3.0);
        t.set_current_time(2.0);
        t.toggle_playing();
        t.take_events();

        t.reset();
        assert!(!t.is_playing());
        assert_eq!(t.max_time(), 0.0);
        assert_eq!(times(&mut t), vec![0.0]);
        assert_eq!(t.slider_position(), 0);
    }
}
