#![cfg_attr(not(test), no_std)]

//! # thermocheck-rs
//! ## Cross-checking two temperature sensors on a Pico
//!
//! Features:
//! - AHT20 humidity/temperature sensor over I2C
//! - NTC thermistor bridge on the ADC
//! - Averaging and absolute/relative error between both sources
//! - Results on a TM1638 segment module, an SSD1306 OLED and the UART

#[macro_use]
mod fmt;

pub mod aht20;
pub mod config;
pub mod pipeline;
pub mod rendering;
pub mod sensors;
pub mod stats;
pub mod tm1638;
