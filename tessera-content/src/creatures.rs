//! Creature aspects: [`Psychic`] and [`Bird`].

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tessera_core::event::Fields;
use tessera_core::registry::{ComponentKind, from_record};
use tessera_core::types::{self, EntityId, Record};
use tessera_core::{Command, Component, Event, Zone};

use crate::named::title_of;
use crate::spatial::{Spatial, emit};

// ---------------------------------------------------------------------------
// Psychic
// ---------------------------------------------------------------------------

/// Repeats whatever is said in its presence.
///
/// The repeat goes through the psychic's own mode, like any other command,
/// so a psychic without a mode stays silent. Repeated speech carries an
/// `echo` flag so that two psychics in one room do not answer each other
/// forever.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psychic;

impl Psychic {
    /// Kind name.
    pub const KIND: &'static str = "Psychic";

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>).before("Spatial.say", repeat)
    }
}

impl Component for Psychic {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

fn repeat(zone: &mut Zone, owner: EntityId, event: &mut Event) -> anyhow::Result<()> {
    if event.actor() == owner || event.flag("echo") || !zone.has(owner, &[Spatial::KIND]) {
        return Ok(());
    }
    let Some(message) = event.text("message").map(str::to_string) else {
        return Ok(());
    };

    let mut fields = Fields::new();
    fields.insert("message".into(), message.into());
    fields.insert("echo".into(), true.into());
    zone.perform(owner, Command::invoke("Spatial.say", fields));
    Ok(())
}

// ---------------------------------------------------------------------------
// Bird
// ---------------------------------------------------------------------------

fn default_noisiness() -> f64 {
    0.05
}

fn default_noise() -> String {
    "chirp".to_string()
}

/// Ticks now and then with a little bird business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bird {
    /// Chance per tick of doing something.
    #[serde(default = "default_noisiness")]
    pub noisiness: f64,
    /// The bird's own noise, as a verb: "chirp", "caw", "squawk".
    #[serde(default = "default_noise")]
    pub noise: String,
}

impl Default for Bird {
    fn default() -> Self {
        Self {
            noisiness: default_noisiness(),
            noise: default_noise(),
        }
    }
}

impl Bird {
    /// Kind name.
    pub const KIND: &'static str = "Bird";

    /// Registration.
    #[must_use]
    pub fn kind() -> ComponentKind {
        ComponentKind::new(Self::KIND, from_record::<Self>).ticking(flutter)
    }

    /// `(second person, third person)` verb pairs for one tick.
    fn antics(&self) -> Vec<(String, String)> {
        vec![
            (self.noise.clone(), format!("{}s", self.noise)),
            ("hop around".into(), "hops around".into()),
            ("flutter".into(), "flutters".into()),
            ("preen".into(), "preens".into()),
            ("peck at the ground".into(), "pecks at the ground".into()),
        ]
    }
}

impl Component for Bird {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Record {
        types::encode(self).unwrap_or_default()
    }
}

fn flutter(zone: &mut Zone, owner: EntityId) -> anyhow::Result<()> {
    let Some(bird) = zone.component::<Bird>(owner).cloned() else {
        return Ok(());
    };
    if zone.rng().gen_range(0.0..1.0) >= bird.noisiness {
        return Ok(());
    }

    let antics = bird.antics();
    let Some((second, third)) = antics.choose(zone.rng()) else {
        return Ok(());
    };
    zone.tell(owner, format!("You {second}."));
    if zone.has(owner, &[Spatial::KIND]) {
        let seen = format!("{} {third}.", title_of(zone, owner));
        emit(zone, owner, &seen);
    }
    Ok(())
}
