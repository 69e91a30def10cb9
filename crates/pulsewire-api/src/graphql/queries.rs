/// Homes visible to the token, with realtime capability.
pub const VIEWER_HOMES: &str = r"
query ViewerHomes {
  viewer {
    homes {
      id
      appNickname
      address { address1 }
      features { realTimeConsumptionEnabled }
    }
  }
}
";

/// Realtime flag for one home plus the websocket endpoint to subscribe on.
pub const REALTIME_INFO: &str = r"
query RealtimeInfo($homeId: ID!) {
  viewer {
    websocketSubscriptionUrl
    home(id: $homeId) {
      id
      features { realTimeConsumptionEnabled }
    }
  }
}
";

/// One-shot pull of the latest measurement.
pub const LIVE_MEASUREMENT_POLL: &str = r"
query LiveMeasurementPoll($homeId: ID!) {
  liveMeasurement(homeId: $homeId) {
    timestamp
    power
    powerProduction
    powerPhase1
    powerPhase2
    powerPhase3
    accumulatedConsumption
    accumulatedProduction
    currentL1
    currentL2
    currentL3
    voltagePhase1
    voltagePhase2
    voltagePhase3
  }
}
";

/// Realtime subscription sent in the `start` frame.
pub const LIVE_MEASUREMENT_SUBSCRIPTION: &str = r"
subscription LiveMeasurement($homeId: ID!) {
  liveMeasurement(homeId: $homeId) {
    timestamp
    power
    powerProduction
    powerPhase1
    powerPhase2
    powerPhase3
    accumulatedConsumption
    accumulatedProduction
    accumulatedConsumptionLastHour
    accumulatedProductionLastHour
    netConsumption
    netProduction
    minPower
    maxPower
    minPowerProduction
    maxPowerProduction
    currentL1
    currentL2
    currentL3
    voltagePhase1
    voltagePhase2
    voltagePhase3
    powerFactor
    signalStrength
  }
}
";
