fn main() {
    println!("cargo:rerun-if-env-changed=COOP_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=COOP_WIFI_PASS");
    println!("cargo:rerun-if-env-changed=COOP_MQTT_URL");

    // Only the firmware build needs the ESP-IDF environment; host test
    // builds run without the `espidf` feature and skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
