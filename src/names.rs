//! Cosmetic names for matches and producers.

use rand::seq::SliceRandom;
use rand::Rng;

const SILLY_FIRST: &[&str] = &[
    "Toe", "Banana", "Fluff", "Noodle", "Grumble", "Wobble", "Pickle", "Sprocket", "Mango",
    "Tickle", "Bumble", "Crunch", "Puddle", "Squish", "Dingle", "Waffle", "Jelly", "Muffin",
    "Bongo", "Snuggle", "Zippy", "Giggle", "Turnip", "Dizzy", "Pepper", "Scooter", "Biscuit",
    "Nugget", "Marble", "Tater",
];

const SILLY_LAST: &[&str] = &[
    "crusher", "smasher", "muncher", "face", "pants", "beard", "snout", "whisker", "nose",
    "toes", "bottom", "sniffer", "wiggle", "flapper", "dancer", "tumbler", "knuckle", "belly",
    "scratcher", "hopper", "grabber", "squeaker", "nibbler", "burp", "monkey", "paws", "feet",
    "bonk", "chomper", "slapper",
];

const ADJECTIVES: &[&str] = &[
    "Ancient", "Brave", "Cheeky", "Daring", "Eager", "Fearless", "Golden", "Hungry", "Jolly",
    "Lucky", "Mighty", "Noisy", "Rowdy", "Sneaky", "Swift", "Wild", "Rusty", "Silent",
];

const NOUNS: &[&str] = &[
    "Barrel", "Canopy", "Coconut", "Galleon", "Hammock", "Jungle", "Lagoon", "Parrot",
    "Pirate", "Raft", "Reef", "Tide", "Vine", "Volcano", "Lantern", "Anchor",
];

fn pick<R: Rng + ?Sized>(rng: &mut R, words: &'static [&'static str]) -> &'static str {
    words.choose(rng).copied().unwrap_or("Monkey")
}

/// A display name such as `Picklecrusher`.
pub fn silly_name() -> String {
    silly_name_with(&mut rand::thread_rng())
}

pub fn silly_name_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}{}", pick(rng, SILLY_FIRST), pick(rng, SILLY_LAST))
}

/// A producer label such as `Sneaky Lagoon`.
pub fn raid_name() -> String {
    let mut rng = rand::thread_rng();
    format!("{} {}", pick(&mut rng, ADJECTIVES), pick(&mut rng, NOUNS))
}
