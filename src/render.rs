use std::{fmt::Write as _, io::Write};

use chrono::Local;
use crossterm::style::{style, Color, Stylize};

use crate::{
    catalog::{self, VehicleClass},
    events::DestroyEvent,
    resolver::CharacterIdentity,
};

const KILLED_BY: &str = "killed by";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    White,
    Magenta,
    Blue,
    Red,
    Grey,
    Orange,
    Cyan,
    Green,
}

impl Tint {
    pub fn for_faction(faction_id: u32) -> Self {
        match faction_id {
            1 => Self::Magenta,
            2 => Self::Blue,
            3 => Self::Red,
            4 => Self::Grey,
            _ => Self::White,
        }
    }

    pub fn for_vehicle_class(class: VehicleClass) -> Self {
        match class {
            VehicleClass::LightGround => Self::Orange,
            VehicleClass::MainBattleTank => Self::Cyan,
            VehicleClass::Fighter => Self::Green,
            VehicleClass::LargeAircraft => Self::Blue,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Magenta => "magenta",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Grey => "grey",
            Self::Orange => "orange4",
            Self::Cyan => "cyan",
            Self::Green => "green",
        }
    }

    fn color(self) -> Color {
        match self {
            Self::White => Color::White,
            Self::Magenta => Color::Magenta,
            Self::Blue => Color::Blue,
            Self::Red => Color::Red,
            Self::Grey => Color::DarkGrey,
            Self::Orange => Color::AnsiValue(94),
            Self::Cyan => Color::Cyan,
            Self::Green => Color::Green,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tint: Option<Tint>,
    pub underline: bool,
}

impl Segment {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tint: None,
            underline: false,
        }
    }

    fn tinted(text: impl Into<String>, tint: Tint) -> Self {
        Self {
            text: text.into(),
            tint: Some(tint),
            underline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputLine {
    pub segments: Vec<Segment>,
}

impl OutputLine {
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    // [tint]..[/tint] and [underline]..[/underline] markers
    pub fn markup(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let mut text = segment.text.clone();
            if let Some(tint) = segment.tint {
                text = format!("[{0}]{text}[/{0}]", tint.tag());
            }
            if segment.underline {
                text = format!("[underline]{text}[/underline]");
            }
            out.push_str(&text);
        }
        out
    }

    pub fn ansi(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let mut styled = style(segment.text.as_str());
            if let Some(tint) = segment.tint {
                styled = styled.with(tint.color());
            }
            if segment.underline {
                styled = styled.underlined();
            }
            let _ = write!(out, "{styled}");
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventRenderer {
    home_faction: Option<u32>,
}

impl EventRenderer {
    pub fn new(home_faction: Option<u32>) -> Self {
        Self { home_faction }
    }

    pub fn render(
        &self,
        event: &DestroyEvent,
        attacker: &CharacterIdentity,
        victim: &CharacterIdentity,
    ) -> OutputLine {
        let timestamp = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
        let vehicle_name = catalog::vehicle_name(event.vehicle_id)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("Vehicle {}", event.vehicle_id));
        let vehicle_tint = catalog::vehicle_class(event.vehicle_id)
            .map(Tint::for_vehicle_class)
            .unwrap_or(Tint::White);
        let friendly_kill = self.home_faction == Some(event.attacker_team_id);
        let victim_tint = Tint::for_faction(victim.faction_id);
        let attacker_tint = Tint::for_faction(attacker.faction_id);

        let mut line = OutputLine::default();
        line.push(Segment::plain(format!("{timestamp}: ")));
        line.push(Segment::tinted(vehicle_name, vehicle_tint));
        line.push(Segment::plain("("));
        line.push(Segment::tinted(victim.name.clone(), victim_tint));
        line.push(Segment::plain(") "));
        line.push(Segment {
            text: KILLED_BY.to_owned(),
            tint: None,
            underline: friendly_kill,
        });
        line.push(Segment::plain(" "));
        line.push(Segment::tinted(attacker.name.clone(), attacker_tint));
        line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStyle {
    Ansi,
    Plain,
}

pub struct FeedWriter<W> {
    out: W,
    style: FeedStyle,
}

impl<W: Write> FeedWriter<W> {
    pub fn new(out: W, style: FeedStyle) -> Self {
        Self { out, style }
    }

    pub fn write_header(&mut self, title: &str) -> std::io::Result<()> {
        let rule = "─".repeat(8);
        let line = match self.style {
            FeedStyle::Ansi => format!("{rule} {} {rule}", style(title).bold()),
            FeedStyle::Plain => format!("{rule} {title} {rule}"),
        };
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn write_line(&mut self, line: &OutputLine) -> std::io::Result<()> {
        let text = match self.style {
            FeedStyle::Ansi => line.ansi(),
            FeedStyle::Plain => line.plain_text(),
        };
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
