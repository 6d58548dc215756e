//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                     | Connects to               |
//! |-------------|--------------------------------|---------------------------|
//! | `board`     | all device ports (composite)   | the adapters below        |
//! |             | SystemPort                     | esp_restart, heap, timer  |
//! | `mqtt`      | TransportPort                  | ESP-MQTT over esp-tls     |
//! | `ota`       | UpdatePort                     | HTTPS client + esp-ota    |
//! | `log_sink`  | EventSink                      | Serial log output         |
//! | `wifi`      | link check for TransportPort   | ESP-IDF Wi-Fi STA         |
//! | `device_id` | -                              | eFuse factory MAC         |
//! | `time`      | -                              | ESP32 system timer        |

pub mod board;
pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod ota;
pub mod time;
pub mod wifi;
