//! Bar-graph effect: a row of vertical bars scaled per frequency bin plus a
//! fixed-width glyph readout underneath.

use glam::Vec3;

use crate::{
    analysis::FrequencyFrame,
    scene::{LabelSprite, MeshBuffer, Renderable, RenderableId, Scene},
    settings::{EffectSettings, Rgb, SettingValue},
    Result,
};

use super::{bin, Effect, EffectState, TimeContext};

const BAR_SPACING: f32 = 2.0;
const LABEL_ROW_Y: f32 = -2.0;

pub struct BarGraphEffect;

impl Effect for BarGraphEffect {
    fn name(&self) -> &'static str {
        "SineWave"
    }

    fn default_settings(&self) -> EffectSettings {
        EffectSettings::new()
            .topology_number("barCount", 16.0, 4.0..=64.0)
            .number("heightScale", 10.0, 1.0..=50.0)
            .color("barColor", Rgb::new(1.0, 1.0, 1.0))
    }

    fn prepare(&self, scene: &mut Scene, settings: &EffectSettings) -> Result<Box<dyn EffectState>> {
        let mut state = BarGraphState {
            bars: Vec::new(),
            labels: Vec::new(),
            height_scale: settings.number_or("heightScale", 10.0) as f32,
        };
        state.build(scene, settings);
        Ok(Box::new(state))
    }
}

struct BarGraphState {
    bars: Vec<RenderableId>,
    labels: Vec<RenderableId>,
    height_scale: f32,
}

impl BarGraphState {
    fn build(&mut self, scene: &mut Scene, settings: &EffectSettings) {
        let count = settings.number_or("barCount", 16.0) as usize;
        let color = settings.color_or("barColor", Rgb::new(1.0, 1.0, 1.0));

        for col in 0..count {
            let x = column_x(col, count);
            let mut bar = MeshBuffer::cuboid(1.0, 1.0, 0.1);
            bar.color = color;
            bar.translation = Vec3::new(x, 0.0, 0.0);
            self.bars.push(scene.insert(Renderable::Mesh(bar)));

            let label = LabelSprite {
                glyph: ' ',
                position: Vec3::new(x, LABEL_ROW_Y, 0.0),
            };
            self.labels.push(scene.insert(Renderable::Label(label)));
        }
    }

    fn release(&mut self, scene: &mut Scene) {
        for id in self.bars.drain(..).chain(self.labels.drain(..)) {
            scene.remove(id);
        }
    }
}

impl EffectState for BarGraphState {
    fn animate(&mut self, scene: &mut Scene, frame: &FrequencyFrame, _time: &TimeContext) {
        for (col, id) in self.bars.iter().enumerate() {
            let height = f32::from(bin(frame, col)) / 128.0 * self.height_scale;
            if let Some(bar) = scene.mesh_mut(*id) {
                bar.scale.y = height;
                bar.translation.y = height * 0.5;
            }
        }

        let frequency = bin(frame, 0);
        let decibel = bin(frame, self.bars.len());
        let cells = layout_label_row(self.labels.len(), frequency, decibel);
        for (id, glyph) in self.labels.iter().zip(cells) {
            if let Some(label) = scene.label_mut(*id) {
                label.glyph = glyph;
            }
        }
    }

    fn apply_setting(&mut self, scene: &mut Scene, key: &str, value: &SettingValue) {
        match (key, value) {
            ("barColor", SettingValue::Color(color)) => {
                for id in &self.bars {
                    if let Some(bar) = scene.mesh_mut(*id) {
                        bar.color = *color;
                    }
                }
            }
            ("heightScale", SettingValue::Number(scale)) => {
                self.height_scale = *scale as f32;
            }
            _ => {}
        }
    }

    fn rebuild(&mut self, scene: &mut Scene, settings: &EffectSettings) -> Result<()> {
        self.release(scene);
        self.build(scene, settings);
        Ok(())
    }

    fn teardown(mut self: Box<Self>, scene: &mut Scene) {
        self.release(scene);
    }
}

fn column_x(col: usize, count: usize) -> f32 {
    col as f32 * BAR_SPACING - (count.saturating_sub(1)) as f32
}

/// Lays the readout text into a fixed-width cell row.
///
/// The two-glyph `||` marker sits at the center indices. Left text (`f:<n>`)
/// is truncated rather than wrapped when it would run into the marker; right
/// text (`dB:<n>`) is right-aligned against the final cell.
fn layout_label_row(count: usize, frequency: u8, decibel: u8) -> Vec<char> {
    let mut cells = vec![' '; count];
    if count < 4 {
        return cells;
    }

    let mid = count / 2;
    let left_end = mid - 2;

    let left: Vec<char> = format!("f:{frequency}").chars().collect();
    for (i, glyph) in left.into_iter().enumerate() {
        if i < left_end {
            cells[i] = glyph;
        }
    }

    cells[mid - 1] = '|';
    cells[mid] = '|';

    let right: Vec<char> = format!("dB:{decibel}").chars().collect();
    let start = count.saturating_sub(right.len());
    for (i, glyph) in right.into_iter().enumerate() {
        if start + i < count {
            cells[start + i] = glyph;
        }
    }

    cells
}
