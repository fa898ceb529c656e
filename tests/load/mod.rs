mod year_replay;
