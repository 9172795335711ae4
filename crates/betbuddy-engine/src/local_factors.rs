// Ballpark run factors and roof information per stadium.

use betbuddy_core::model::LocalFactors;

/// Park factor used for venues missing from the table.
pub const NEUTRAL_BALLPARK_FACTOR: f64 = 100.0;

/// Static facts about one stadium. Factors are based on 2021-2023 run data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ballpark {
    pub stadium: &'static str,
    pub home_team: &'static str,
    /// Forecast location passed to the weather provider.
    pub city: &'static str,
    pub factor: f64,
    /// Retractable or fixed roof; weather is treated as neutral.
    pub roofed: bool,
}

const fn park(stadium: &'static str, home_team: &'static str, city: &'static str, factor: f64, roofed: bool) -> Ballpark {
    Ballpark {
        stadium,
        home_team,
        city,
        factor,
        roofed,
    }
}

pub const BALLPARKS: [Ballpark; 30] = [
    park("Coors Field", "Colorado Rockies", "Denver", 112.0, false),
    park("Fenway Park", "Boston Red Sox", "Boston", 108.0, false),
    park("Great American Ball Park", "Cincinnati Reds", "Cincinnati", 107.0, false),
    park("Kauffman Stadium", "Kansas City Royals", "Kansas City", 104.0, false),
    park("Nationals Park", "Washington Nationals", "Washington", 103.0, false),
    park("Globe Life Field", "Texas Rangers", "Arlington", 102.0, true),
    park("PNC Park", "Pittsburgh Pirates", "Pittsburgh", 101.0, false),
    park("Truist Park", "Atlanta Braves", "Atlanta", 101.0, false),
    park("Wrigley Field", "Chicago Cubs", "Chicago", 101.0, false),
    park("Citizens Bank Park", "Philadelphia Phillies", "Philadelphia", 101.0, false),
    park("Oriole Park at Camden Yards", "Baltimore Orioles", "Baltimore", 101.0, false),
    park("Chase Field", "Arizona Diamondbacks", "Phoenix", 100.0, true),
    park("Target Field", "Minnesota Twins", "Minneapolis", 100.0, false),
    park("Angel Stadium", "Los Angeles Angels", "Anaheim", 100.0, false),
    park("Rogers Centre", "Toronto Blue Jays", "Toronto", 100.0, true),
    park("Minute Maid Park", "Houston Astros", "Houston", 100.0, true),
    park("Guaranteed Rate Field", "Chicago White Sox", "Chicago", 100.0, false),
    park("Busch Stadium", "St. Louis Cardinals", "St. Louis", 99.0, false),
    park("Dodger Stadium", "Los Angeles Dodgers", "Los Angeles", 99.0, false),
    park("Yankee Stadium", "New York Yankees", "Bronx", 98.0, false),
    park("loanDepot park", "Miami Marlins", "Miami", 98.0, true),
    park("Oracle Park", "San Francisco Giants", "San Francisco", 97.0, false),
    park("Comerica Park", "Detroit Tigers", "Detroit", 97.0, false),
    park("Progressive Field", "Cleveland Guardians", "Cleveland", 97.0, false),
    park("American Family Field", "Milwaukee Brewers", "Milwaukee", 97.0, true),
    park("Citi Field", "New York Mets", "Queens", 96.0, false),
    park("Tropicana Field", "Tampa Bay Rays", "St. Petersburg", 96.0, true),
    park("Oakland Coliseum", "Oakland Athletics", "Oakland", 96.0, false),
    park("Petco Park", "San Diego Padres", "San Diego", 95.0, false),
    park("T-Mobile Park", "Seattle Mariners", "Seattle", 92.0, true),
];

/// Look up a stadium by its upstream venue name.
pub fn ballpark(stadium: &str) -> Option<&'static Ballpark> {
    let stadium = stadium.trim();
    BALLPARKS.iter().find(|p| p.stadium.eq_ignore_ascii_case(stadium))
}

/// Local factors for `stadium` without weather. Unknown venues are neutral
/// and open-air.
pub fn local_factors(stadium: &str) -> LocalFactors {
    let park = ballpark(stadium);
    LocalFactors {
        stadium: stadium.trim().to_string(),
        ballpark_factor: park.map_or(NEUTRAL_BALLPARK_FACTOR, |p| p.factor),
        roofed: park.is_some_and(|p| p.roofed),
        weather: None,
    }
}

/// Forecast location for `stadium`, if known.
pub fn city_of(stadium: &str) -> Option<&'static str> {
    ballpark(stadium).map(|p| p.city)
}
