pub(crate) const BANNER: &str = r"
  ██████  ███████ ██    ██  ██████ ████████ ██
  ██   ██ ██      ██    ██ ██         ██    ██
  ██   ██ █████   ██    ██ ██         ██    ██
  ██   ██ ██       ██  ██  ██         ██    ██
  ██████  ███████   ████    ██████    ██    ███████
";

/// Pin assignment of the ESP-32 boards the controller drives.
pub(crate) const PIN_DIAGRAM: &str = r"          *+----------------------+
           |[3V3]            [GND]|
           |[EN ]            [G23]|
     [IN0 ]|[G36]  +------+  [G22]|[SHT-SCL]
     [IN1 ]|[G39]  |ESP-32|  [G1 ]|
     [IN2 ]|[G34]  +------+  [G3 ]|
     [IN3 ]|[G35]            [G21]|[SHT-SDA]
     [IN4 ]|[G32]            [GND]|
     [IN5 ]|[G33]            [G19]|
     [IN6 ]|[G25]            [G18]|
     [IN7 ]|[G26]            [G5 ]|
     [OUT0]|[G27]            [G17]|[PWM (CO2)]
     [OUT1]|[G14]            [G16]|
     [OUT2]|[G12]            [G4 ]|
     [OUT3]|[G13]            [G0 ]|
           |[G9 ]            [G2 ]|
           |[G10]            [G15]|
           |[G11]            [G8 ]|
           |[GND]            [G7 ]|
           |[5V ]            [G6 ]|
           +----------------------+";
