pub mod handoff;
pub mod neopixel;
