pub mod configuration;

pub mod manager {
    pub mod managererror;
    pub mod manager;
}

pub mod math {
    pub mod curve {
        pub mod curve;
        pub mod piecewisesegmentfunction;
    }

    pub mod symbolic {
        pub mod symbolicerror;
        pub mod uniquevalues;
        pub mod polynomial;
        pub mod segmentfunction;

        #[cfg(test)]
        mod proptests;
    }
}

pub mod settings;
